//! Email message types.

use lettre::message::{MultiPart, SinglePart, header::ContentType};
use serde::{Deserialize, Serialize};

use crate::{Address, IntoAddress, MailError, Result};

/// Email message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    /// Sender address.
    pub from: Option<Address>,
    /// Reply-to address.
    pub reply_to: Option<Address>,
    /// To recipients.
    pub to: Vec<Address>,
    /// CC recipients.
    pub cc: Vec<Address>,
    /// BCC recipients.
    pub bcc: Vec<Address>,
    /// Email subject.
    pub subject: Option<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the from address. Invalid addresses are ignored and caught by [`Email::validate`].
    pub fn from(mut self, from: impl IntoAddress) -> Self {
        self.from = from.into_address().ok();
        self
    }

    /// Set the reply-to address.
    pub fn reply_to(mut self, reply_to: impl IntoAddress) -> Self {
        self.reply_to = reply_to.into_address().ok();
        self
    }

    /// Add a to recipient.
    pub fn to(mut self, to: impl IntoAddress) -> Self {
        if let Ok(addr) = to.into_address() {
            self.to.push(addr);
        }
        self
    }

    /// Add a CC recipient.
    pub fn cc(mut self, cc: impl IntoAddress) -> Self {
        if let Ok(addr) = cc.into_address() {
            self.cc.push(addr);
        }
        self
    }

    /// Add a BCC recipient.
    pub fn bcc(mut self, bcc: impl IntoAddress) -> Self {
        if let Ok(addr) = bcc.into_address() {
            self.bcc.push(addr);
        }
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the plain text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the HTML body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// All recipients, to then cc then bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Validate the email.
    pub fn validate(&self) -> Result<()> {
        if self.from.is_none() {
            return Err(MailError::MissingField("from"));
        }
        if self.recipients().next().is_none() {
            return Err(MailError::MissingField("to/cc/bcc"));
        }
        if self.subject.is_none() {
            return Err(MailError::MissingField("subject"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(MailError::MissingField("text/html body"));
        }
        Ok(())
    }

    /// Build a lettre message.
    pub(crate) fn to_lettre(&self) -> Result<lettre::Message> {
        self.validate()?;

        let from = self
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?
            .to_mailbox()?;

        let mut builder = lettre::Message::builder()
            .from(from)
            .subject(self.subject.as_deref().unwrap_or_default());

        for addr in &self.to {
            builder = builder.to(addr.to_mailbox()?);
        }
        for addr in &self.cc {
            builder = builder.cc(addr.to_mailbox()?);
        }
        for addr in &self.bcc {
            builder = builder.bcc(addr.to_mailbox()?);
        }

        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.to_mailbox()?);
        }

        let message = match (&self.html, &self.text) {
            (Some(html), Some(text)) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                html.clone(),
            )),
            (Some(html), None) => builder.singlepart(SinglePart::html(html.clone())),
            (None, Some(text)) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone()),
            (None, None) => return Err(MailError::MissingField("text/html body")),
        };

        Ok(message?)
    }
}
