//! Polls GitHub for pull requests matching saved searches, folds each PR's
//! CI signals into one status, and publishes the result on a timer.

pub mod app;
pub mod github;
pub mod reconcile;
pub mod store;
pub mod util;
