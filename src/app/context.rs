use std::sync::Arc;

use crate::app::fetch::FetchOptions;
use crate::github::gateway::Gateway;
use crate::store::{SecretStore, SettingsStore};

/// Root dependency container handed to the scheduler.
#[derive(Clone)]
pub struct AppContext {
    pub gateway: Arc<dyn Gateway>,
    pub settings: Arc<dyn SettingsStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub fetch: FetchOptions,
}

impl AppContext {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
        fetch: FetchOptions,
    ) -> Self {
        Self {
            gateway,
            settings,
            secrets,
            fetch,
        }
    }
}
