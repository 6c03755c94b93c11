//! External collaborators the refresh core depends on, behind capability
//! traits so the scheduler can be driven by in-memory fakes.

pub mod secrets;
pub mod settings;

pub use secrets::{MemorySecretStore, SecretStore};
pub use settings::{MemorySettingsStore, Settings, SettingsStore};
