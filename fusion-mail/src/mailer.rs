//! High-level mailer interface.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Address, Email, Result, SmtpConfig, SmtpTransport, Transport};

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The transport accepted the message.
    Sent,
    /// The message was not delivered.
    Failed {
        /// Why delivery failed.
        reason: String,
    },
}

impl Delivery {
    /// Whether the message was delivered.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

impl From<Result<()>> for Delivery {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// High-level mailer for sending emails.
///
/// Each message is attempted once; callers that need retries own them.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn Transport>,
    default_from: Option<Address>,
}

impl Mailer {
    /// Create a new mailer with an SMTP transport.
    pub fn smtp(smtp_config: SmtpConfig) -> Result<Self> {
        let transport = SmtpTransport::new(smtp_config)?;
        Ok(Self::new(transport))
    }

    /// Create a new mailer with a custom transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            default_from: None,
        }
    }

    /// Set the default from address.
    pub fn default_from(mut self, from: &str) -> Result<Self> {
        self.default_from = Some(Address::parse(from)?);
        Ok(self)
    }

    /// Send an email.
    pub async fn send(&self, email: Email) -> Result<()> {
        let email = self.apply_defaults(email);
        email.validate()?;
        self.transport.send(&email).await
    }

    /// Send a simple HTML email.
    pub async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let email = Email::new()
            .to(Address::parse(to)?)
            .subject(subject)
            .html(html);

        self.send(email).await
    }

    /// Send an HTML email and report the outcome instead of an error.
    ///
    /// Failures are logged here, so callers only need to branch on the result.
    pub async fn deliver(&self, to: &str, subject: &str, html: &str) -> Delivery {
        let delivery = Delivery::from(self.send_html(to, subject, html).await);
        match &delivery {
            Delivery::Sent => debug!(to = %to, subject = %subject, "Email delivered"),
            Delivery::Failed { reason } => {
                warn!(to = %to, subject = %subject, reason = %reason, "Email delivery failed")
            }
        }
        delivery
    }

    /// Check if the transport is healthy.
    pub async fn is_healthy(&self) -> bool {
        self.transport.is_healthy().await
    }

    fn apply_defaults(&self, mut email: Email) -> Email {
        if email.from.is_none() {
            email.from = self.default_from.clone();
        }
        email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MailError;

    #[test]
    fn test_delivery_from_result() {
        assert_eq!(Delivery::from(Ok(())), Delivery::Sent);

        let failed = Delivery::from(Err(MailError::Timeout));
        assert!(!failed.is_sent());
        assert_eq!(failed.to_string(), "failed: Operation timed out");
    }

    struct Discard;

    #[async_trait::async_trait]
    impl Transport for Discard {
        async fn send(&self, _email: &Email) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_from_must_parse() {
        let mailer = Mailer::new(Discard);

        assert!(mailer.clone().default_from("Product Fusion <noreply@fusion.example.com>").is_ok());
        assert!(mailer.default_from("nobody").is_err());
    }
}
