pub mod actions;
pub mod context;
pub mod fetch;
pub mod scheduler;
pub mod state;
pub mod update;
pub mod view;

pub use context::AppContext;
pub use fetch::{CycleReport, FetchOptions, Orchestrator};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use state::{QueryResult, RefreshState, Snapshot};
