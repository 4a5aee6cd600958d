//! Authentication configuration.

use serde::Deserialize;

/// Configuration for the authentication service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 token signing.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 86_400 = 24 hours).
    pub jwt_expiry_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    pub min_password_length: usize,
    /// Password-reset and invitation token lifetime (default: 1 hour).
    pub reset_token_lifetime_secs: u64,
    /// Base URL of the web client, used to build links in emails.
    pub app_base_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_expiry_secs: 86_400,
            jwt_issuer: "callscope".into(),
            pepper: None,
            min_password_length: 8,
            reset_token_lifetime_secs: 3600,
            app_base_url: "http://localhost:3000".into(),
        }
    }
}

impl AuthConfig {
    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={token}",
            self.app_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_trims_trailing_slash() {
        let config = AuthConfig {
            app_base_url: "https://app.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.reset_link("abc"),
            "https://app.example.com/reset-password?token=abc"
        );
    }
}
