//! Handlebars template engine integration.

use handlebars::Handlebars;
use tracing::debug;

use crate::{MailError, RenderedTemplate, Result, TemplateEngine};

/// Account verification after signup. Context: `email`, `link`.
pub const VERIFY_EMAIL: &str = "verify_email";
/// Sign-in from a new session. Context: `email`, `time`, `ip`, `user_agent`.
pub const LOGIN_ALERT: &str = "login_alert";
/// Password reset link. Context: `link`.
pub const PASSWORD_RESET: &str = "password_reset";
/// Password change confirmation. Context: `email`.
pub const PASSWORD_UPDATED: &str = "password_updated";
/// Organization invitation. Context: `email`, `organization`, `link`.
pub const MEMBER_INVITE: &str = "member_invite";

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #222;">
<div style="max-width: 600px; margin: 0 auto; padding: 24px;">"#;

const FOOTER: &str = r#"<p style="font-size: 12px; color: #888;">This is an automated message from Product Fusion. Please do not reply.</p>
</div>
</body>
</html>"#;

/// (name, subject, html)
const TRANSACTIONAL: [(&str, &str, &str); 5] = [
    (
        VERIFY_EMAIL,
        "Welcome - Verify Your Email",
        r#"{{> header}}
<h2>Welcome to Product Fusion!</h2>
<p>An account was created for {{email}}. Please verify your email address to get started.</p>
<p><a href="{{link}}">Verify Email</a></p>
<p>If the button does not work, copy this link into your browser: {{link}}</p>
{{> footer}}"#,
    ),
    (
        LOGIN_ALERT,
        "New Login Detected",
        r#"{{> header}}
<h2>New Login Detected</h2>
<p>We noticed a new sign-in to {{email}}.</p>
<ul>
<li>Time: {{time}}</li>
<li>IP address: {{ip}}</li>
<li>Device: {{user_agent}}</li>
</ul>
<p>If this was not you, reset your password immediately.</p>
{{> footer}}"#,
    ),
    (
        PASSWORD_RESET,
        "Password Reset Request",
        r#"{{> header}}
<h2>Password Reset</h2>
<p>We received a request to reset your password.</p>
<p><a href="{{link}}">Reset Password</a></p>
<p>If you did not request this, please ignore this email.</p>
{{> footer}}"#,
    ),
    (
        PASSWORD_UPDATED,
        "Password Updated",
        r#"{{> header}}
<h2>Password Updated</h2>
<p>The password for {{email}} was changed.</p>
<p>If you did not make this change, contact support right away.</p>
{{> footer}}"#,
    ),
    (
        MEMBER_INVITE,
        "You're Invited to {{{organization}}}",
        r#"{{> header}}
<h2>You have been invited</h2>
<p>{{email}} was invited to join {{organization}} on Product Fusion.</p>
<p><a href="{{link}}">Accept Invitation</a></p>
{{> footer}}"#,
    ),
];

/// Handlebars-based template engine for emails.
///
/// A template named `welcome` is stored as up to three parts:
/// `welcome/html`, `welcome/text` and `welcome/subject`.
pub struct HandlebarsEngine {
    handlebars: Handlebars<'static>,
}

impl HandlebarsEngine {
    /// Create a new, empty Handlebars engine in strict mode.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        Self { handlebars }
    }

    /// Create an engine with the built-in transactional templates registered.
    pub fn transactional() -> Result<Self> {
        let mut engine = Self::new()
            .register_partial("header", HEADER)?
            .register_partial("footer", FOOTER)?;

        for (name, subject, html) in TRANSACTIONAL {
            engine.register_parts(name, Some(subject), Some(html), None)?;
        }

        debug!(count = TRANSACTIONAL.len(), "Loaded transactional email templates");
        Ok(engine)
    }

    /// Register any combination of subject, HTML and text parts for a template.
    pub fn register_parts(
        &mut self,
        name: &str,
        subject: Option<&str>,
        html: Option<&str>,
        text: Option<&str>,
    ) -> Result<()> {
        if html.is_none() && text.is_none() {
            return Err(MailError::Config(format!(
                "template {} needs an html or text part",
                name
            )));
        }

        for (part, content) in [("subject", subject), ("html", html), ("text", text)] {
            if let Some(content) = content {
                self.handlebars
                    .register_template_string(&format!("{}/{}", name, part), content)?;
            }
        }
        Ok(())
    }

    /// Register a partial template.
    pub fn register_partial(mut self, name: &str, content: &str) -> Result<Self> {
        self.handlebars.register_partial(name, content)?;
        Ok(self)
    }

    fn render_part(
        &self,
        name: &str,
        part: &str,
        context: &serde_json::Value,
    ) -> Result<Option<String>> {
        let key = format!("{}/{}", name, part);
        if !self.handlebars.has_template(&key) {
            return Ok(None);
        }
        Ok(Some(self.handlebars.render(&key, context)?))
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<RenderedTemplate> {
        if !self.has_template(name) {
            return Err(MailError::TemplateNotFound(name.to_string()));
        }

        Ok(RenderedTemplate {
            html: self.render_part(name, "html", context)?,
            text: self.render_part(name, "text", context)?,
            subject: self
                .render_part(name, "subject", context)?
                .map(|s| s.trim().to_string()),
        })
    }

    fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(&format!("{}/html", name))
            || self.handlebars.has_template(&format!("{}/text", name))
    }

    fn register_template(&mut self, name: &str, content: &str) -> Result<()> {
        self.register_parts(name, None, Some(content), None)
    }
}
