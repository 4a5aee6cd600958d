//! Outbound email.
//!
//! Delivery is fire-and-forget from the caller's point of view: the
//! auth service spawns the send and only logs failures.

use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::info;

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: EmailMessage) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `CallScope <no-reply@example.com>`.
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// STARTTLS SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AuthError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Mail(format!("invalid sender address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AuthError::Mail(format!("smtp relay: {e}")))?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AuthError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Mail(format!("invalid recipient: {e}")))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| AuthError::Mail(format!("build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AuthError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Writes messages to the log instead of sending them. Used when no SMTP
/// relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AuthError> {
        info!(to = %message.to, subject = %message.subject, "Email not sent: no SMTP relay configured");
        Ok(())
    }
}

/// Records messages in memory; for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AuthError> {
        self.sent
            .lock()
            .map_err(|_| AuthError::Mail("mailbox lock poisoned".into()))?
            .push(message);
        Ok(())
    }
}

/// Runtime-selected delivery backend.
#[derive(Clone)]
pub enum AnyMailer {
    Smtp(SmtpMailer),
    Log(LogMailer),
    Memory(MemoryMailer),
}

impl AnyMailer {
    /// SMTP when configured, otherwise log-only.
    pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Self, AuthError> {
        match smtp {
            Some(config) => Ok(AnyMailer::Smtp(SmtpMailer::new(config)?)),
            None => Ok(AnyMailer::Log(LogMailer)),
        }
    }
}

impl Mailer for AnyMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), AuthError> {
        match self {
            AnyMailer::Smtp(m) => m.send(message).await,
            AnyMailer::Log(m) => m.send(message).await,
            AnyMailer::Memory(m) => m.send(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "ada@example.com".into(),
            subject: "Hello".into(),
            body: "Body".into(),
        }
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        let clone = mailer.clone();
        clone.send(message()).await.unwrap();
        assert_eq!(mailer.sent_messages(), vec![message()]);
    }

    #[tokio::test]
    async fn missing_smtp_config_falls_back_to_log() {
        let mailer = AnyMailer::from_config(None).unwrap();
        assert!(matches!(mailer, AnyMailer::Log(_)));
        mailer.send(message()).await.unwrap();
    }

    #[test]
    fn invalid_sender_is_rejected() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: None,
            password: None,
            from: "not an address".into(),
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
