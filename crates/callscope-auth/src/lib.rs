//! CallScope Auth: password hashing, JWT issuance and validation,
//! organization API keys, password reset and outbound mail.

pub mod api_key;
pub mod config;
pub mod error;
pub mod mailer;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use mailer::{AnyMailer, EmailMessage, LogMailer, Mailer, MemoryMailer, SmtpConfig, SmtpMailer};
pub use service::{AuthOutput, AuthService, CreatedUser, LoginInput, NewUser, RegisterInput};
pub use token::AccessTokenClaims;
