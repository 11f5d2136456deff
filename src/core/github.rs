pub mod auth;
pub mod client;
pub mod error;
pub mod types;


pub use auth::{AppAuth, FileSecretSource, SecretSource};
pub use client::{Credentials, GitHubClient};
pub use error::ApiError;
