pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod mapper;
pub mod models;
pub mod node_id;
pub mod queries;

pub use client::GithubClient;
pub use error::{ApiError, TransportKind};
pub use gateway::{ApiRequest, Gateway};
pub use models::*;
