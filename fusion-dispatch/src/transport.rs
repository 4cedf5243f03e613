//! Mail transport port.

use async_trait::async_trait;
use fusion_mail::{Delivery, Mailer};

/// Sends one rendered email.
///
/// Failures are reported through [`Delivery`], never as errors.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send an HTML email to one recipient.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Delivery;
}

#[async_trait]
impl MailTransport for Mailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Delivery {
        self.deliver(to, subject, html).await
    }
}
