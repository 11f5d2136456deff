use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigLoadError),

    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] crate::core::github::ApiError),

    #[error("Template error: {0}")]
    Template(#[from] crate::core::rules::transform::TransformError),

    #[error("Server error: {0}")]
    Server(anyhow::Error),

    #[error("Invalid flags: {0}")]
    InvalidFlags(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
