use std::sync::RwLock;

/// Opaque get/set storage for the API credential.
pub trait SecretStore: Send + Sync {
    fn get_credential(&self) -> Option<String>;
    fn set_credential(&self, value: &str) -> bool;
    fn clear_credential(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    credential: RwLock<Option<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(value: &str) -> Self {
        Self {
            credential: RwLock::new(Some(value.to_string())),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn get_credential(&self) -> Option<String> {
        self.credential.read().ok().and_then(|c| c.clone())
    }

    /// Empty values are rejected.
    fn set_credential(&self, value: &str) -> bool {
        if value.trim().is_empty() {
            return false;
        }
        match self.credential.write() {
            Ok(mut slot) => {
                *slot = Some(value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn clear_credential(&self) -> bool {
        match self.credential.write() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        }
    }
}
