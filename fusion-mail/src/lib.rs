//! # Fusion Mail
//!
//! Email sending over SMTP plus the transactional templates Product Fusion
//! sends to its users.
//!
//! ## Features
//!
//! - **SMTP Transport**: lettre-based SMTP with implicit TLS, STARTTLS or plain
//! - **Delivery results**: [`Mailer::deliver`] reports [`Delivery`] instead of erroring
//! - **Templates**: Handlebars subject/HTML/text templates, with the
//!   transactional set built in
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fusion_mail::{Mailer, SmtpConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SmtpConfig::new("smtp.example.com")
//!         .credentials("mailer@example.com", "password");
//!
//!     let mailer = Mailer::smtp(config)?.default_from("mailer@example.com")?;
//!
//!     let delivery = mailer
//!         .deliver("ada@example.com", "Password Updated", "<p>Done.</p>")
//!         .await;
//!     println!("{}", delivery);
//!     Ok(())
//! }
//! ```
//!
//! ## With Templates
//!
//! ```rust,ignore
//! use fusion_mail::{HandlebarsEngine, TemplateEngine, templates};
//! use serde_json::json;
//!
//! let engine = HandlebarsEngine::transactional()?;
//! let rendered = engine.render(
//!     templates::PASSWORD_RESET,
//!     &json!({ "link": "https://fusion.example.com/reset?token=abc" }),
//! )?;
//! ```

mod address;
mod email;
mod error;
mod mailer;
mod transport;

#[cfg(feature = "handlebars")]
mod template_handlebars;

pub use address::{Address, IntoAddress};
pub use email::Email;
pub use error::{MailError, Result};
pub use mailer::{Delivery, Mailer};
pub use transport::{SmtpConfig, SmtpSecurity, SmtpTransport, Transport};

#[cfg(feature = "handlebars")]
pub use template_handlebars::HandlebarsEngine;

/// Names of the built-in transactional templates.
#[cfg(feature = "handlebars")]
pub mod templates {
    pub use crate::template_handlebars::{
        LOGIN_ALERT, MEMBER_INVITE, PASSWORD_RESET, PASSWORD_UPDATED, VERIFY_EMAIL,
    };
}

/// Template engine trait for rendering email templates.
pub trait TemplateEngine: Send + Sync {
    /// Render a template with the given name and context.
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<RenderedTemplate>;

    /// Check if a template exists.
    fn has_template(&self, name: &str) -> bool;

    /// Register a template from a string.
    fn register_template(&mut self, name: &str, content: &str) -> Result<()>;
}

/// Rendered template output.
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    /// HTML content (if available).
    pub html: Option<String>,
    /// Plain text content (if available).
    pub text: Option<String>,
    /// Subject line (if available).
    pub subject: Option<String>,
}

impl RenderedTemplate {
    /// Create a new rendered template with HTML content.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            text: None,
            subject: None,
        }
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Prelude for common imports.
///
/// ```
/// use fusion_mail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::address::{Address, IntoAddress};
    pub use crate::email::Email;
    pub use crate::error::MailError;
    pub use crate::mailer::{Delivery, Mailer};
    pub use crate::transport::{SmtpConfig, SmtpSecurity, SmtpTransport, Transport};
    pub use crate::{RenderedTemplate, TemplateEngine};

    #[cfg(feature = "handlebars")]
    pub use crate::HandlebarsEngine;
}
