//! Authentication error types.

use callscope_core::error::CallscopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("organization is inactive")]
    OrganizationInactive,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("API access is not enabled for this organization")]
    ApiAccessDisabled,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CallscopeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::OrganizationInactive
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::InvalidApiKey => CallscopeError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::ApiAccessDisabled => CallscopeError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AuthError::WeakPassword(_) => CallscopeError::Validation {
                message: err.to_string(),
            },
            AuthError::Mail(msg) => CallscopeError::Internal(msg),
            AuthError::Crypto(msg) => CallscopeError::Crypto(msg),
        }
    }
}
