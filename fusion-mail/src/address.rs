//! Email address types.

use crate::{MailError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The email address.
    pub email: String,
    /// Optional display name.
    pub name: Option<String>,
}

impl Address {
    /// Create a new address with just an email.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_string();
        validate_email(&email)?;
        Ok(Self { email, name: None })
    }

    /// Create a new address with a display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let mut address = Self::new(email)?;
        address.name = Some(name.into());
        Ok(address)
    }

    /// Parse an address from a string like "Name <email@example.com>" or "email@example.com".
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(start) = s.find('<')
            && let Some(end) = s.rfind('>')
            && start < end
        {
            let name = s[..start].trim().trim_matches('"');
            let email = &s[start + 1..end];

            return if name.is_empty() {
                Self::new(email)
            } else {
                Self::with_name(email, name)
            };
        }

        Self::new(s)
    }

    /// Get the email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Get the display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Convert to a lettre mailbox.
    pub(crate) fn to_mailbox(&self) -> Result<lettre::message::Mailbox> {
        let address: lettre::Address = self.email.parse()?;
        Ok(lettre::message::Mailbox::new(self.name.clone(), address))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

impl TryFrom<&str> for Address {
    type Error = MailError;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Trait for types that can be converted to an Address.
pub trait IntoAddress {
    /// Convert into an Address.
    fn into_address(self) -> Result<Address>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address> {
        Ok(self)
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> Result<Address> {
        Address::parse(self)
    }
}

impl IntoAddress for String {
    fn into_address(self) -> Result<Address> {
        Address::parse(&self)
    }
}

impl IntoAddress for &String {
    fn into_address(self) -> Result<Address> {
        Address::parse(self)
    }
}

/// Basic shape check; lettre does the strict parse when the message is built.
fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(MailError::InvalidAddress(
            "Email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(MailError::InvalidAddress(format!(
            "Invalid email format: {}",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(MailError::InvalidAddress(format!(
            "Invalid email format: {}",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(MailError::InvalidAddress(format!(
            "Invalid domain in email: {}",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        let addr = Address::parse("ada@example.com").unwrap();
        assert_eq!(addr.email, "ada@example.com");
        assert!(addr.name.is_none());

        let addr = Address::parse("Product Fusion <noreply@fusion.example.com>").unwrap();
        assert_eq!(addr.email, "noreply@fusion.example.com");
        assert_eq!(addr.name(), Some("Product Fusion"));

        let addr = Address::parse("<ops@example.com>").unwrap();
        assert!(addr.name.is_none());
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new("ada@example.com").unwrap();
        assert_eq!(addr.to_string(), "ada@example.com");

        let addr = Address::with_name("ada@example.com", "Ada").unwrap();
        assert_eq!(addr.to_string(), "Ada <ada@example.com>");
    }

    #[test]
    fn test_invalid_email() {
        assert!(Address::new("").is_err());
        assert!(Address::new("invalid").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("ada@").is_err());
        assert!(Address::new("ada@localhost").is_err());
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_to_mailbox() {
        let mailbox = Address::with_name("ada@example.com", "Ada")
            .unwrap()
            .to_mailbox()
            .unwrap();
        assert_eq!(mailbox.email.to_string(), "ada@example.com");
        assert_eq!(mailbox.name.as_deref(), Some("Ada"));
    }
}
