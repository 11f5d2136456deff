use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned error: {status} - {message}")]
    ApiResponse { status: u16, message: String },

    #[error("GitHub App credentials are not configured")]
    CredentialsMissing,

    #[error("secret manager error: {0}")]
    SecretManager(String),

    #[error("failed to sign app assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange failed: expected 201, got {status} - {message}")]
    TokenExchange { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to create HTTP client: {0}")]
    ClientCreation(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::ApiResponse { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(ApiError::ApiResponse {
            status: 502,
            message: String::new()
        }
        .is_transient());
        assert!(ApiError::ApiResponse {
            status: 429,
            message: String::new()
        }
        .is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!ApiError::ApiResponse {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!ApiError::CredentialsMissing.is_transient());
    }
}
