//! Email job records.
//!
//! A job is stored as a flat string hash and published as a flat JSON
//! object with the same fields:
//!
//! ```text
//! email    recipient address, also the key suffix
//! subject  subject line
//! body     pre-rendered HTML body
//! status   queued | sent
//! ...      any extra producer fields
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::{DispatchError, Result};

/// Field holding the recipient address.
pub const FIELD_EMAIL: &str = "email";
/// Field holding the subject line.
pub const FIELD_SUBJECT: &str = "subject";
/// Field holding the HTML body.
pub const FIELD_BODY: &str = "body";
/// Field holding the job status.
pub const FIELD_STATUS: &str = "status";

const RESERVED: [&str; 4] = [FIELD_EMAIL, FIELD_SUBJECT, FIELD_BODY, FIELD_STATUS];

/// Delivery status of a job. Only ever moves from `Queued` to `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Written to the store, not yet delivered.
    #[default]
    Queued,
    /// Accepted by the mail transport.
    Sent,
}

impl JobStatus {
    /// The stored form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            other => Err(DispatchError::InvalidRecord(format!("unknown status: {}", other))),
        }
    }
}

/// One outstanding email.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmailJob {
    /// Recipient address. Set by the dispatcher on enqueue.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Pre-rendered HTML body.
    pub body: String,
    /// Delivery status.
    pub status: JobStatus,
    /// Extra producer fields, stored alongside the required ones.
    pub extra: BTreeMap<String, String>,
}

impl EmailJob {
    /// Create a job with a subject and HTML body.
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Set the recipient.
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// Add an extra field. Names of the required fields are ignored.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if !RESERVED.contains(&name.as_str()) {
            self.extra.insert(name, value.into());
        }
        self
    }

    /// The flat field list written to the job store.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            (FIELD_EMAIL.to_string(), self.recipient.clone()),
            (FIELD_SUBJECT.to_string(), self.subject.clone()),
            (FIELD_BODY.to_string(), self.body.clone()),
            (FIELD_STATUS.to_string(), self.status.to_string()),
        ];
        fields.extend(
            self.extra
                .iter()
                .filter(|(name, _)| !RESERVED.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        fields
    }

    /// Decode a job from a stored field mapping.
    pub fn from_fields(mut fields: HashMap<String, String>) -> Result<Self> {
        let mut take = |name: &'static str| {
            fields
                .remove(name)
                .ok_or_else(|| DispatchError::InvalidRecord(format!("missing field: {}", name)))
        };

        let recipient = take(FIELD_EMAIL)?;
        let subject = take(FIELD_SUBJECT)?;
        let body = take(FIELD_BODY)?;
        let status = match fields.remove(FIELD_STATUS) {
            Some(status) => status.parse()?,
            None => JobStatus::Queued,
        };

        if recipient.trim().is_empty() {
            return Err(DispatchError::InvalidRecord("empty recipient".to_string()));
        }

        Ok(Self {
            recipient,
            subject,
            body,
            status,
            extra: fields.into_iter().collect(),
        })
    }

    /// Serialize the job as the JSON object published on the channel.
    pub fn to_payload(&self) -> Result<String> {
        let object: Map<String, Value> = self
            .to_fields()
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        Ok(serde_json::to_string(&object)?)
    }

    /// Decode a channel payload.
    ///
    /// Returns `Ok(None)` for empty or falsy payloads (`""`, `null`, `{}`,
    /// `[]`, `false`, `0`). Non-string values inside the object are kept as
    /// their JSON text.
    pub fn from_payload(payload: &str) -> Result<Option<Self>> {
        if payload.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(payload)
            .map_err(|e| DispatchError::InvalidRecord(format!("payload is not JSON: {}", e)))?;

        if is_falsy(&value) {
            return Ok(None);
        }

        let Value::Object(object) = value else {
            return Err(DispatchError::InvalidRecord(
                "payload is not a JSON object".to_string(),
            ));
        };

        let fields = object
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((name, s)),
                other => Some((name, other.to_string())),
            })
            .collect();

        Self::from_fields(fields).map(Some)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> EmailJob {
        EmailJob::new("Password Reset Request", "<p>reset</p>")
            .recipient("ada@example.com")
            .with_field("template", "password_reset")
    }

    #[test]
    fn test_fields_roundtrip() {
        let job = job();
        let fields: HashMap<_, _> = job.to_fields().into_iter().collect();

        assert_eq!(fields["email"], "ada@example.com");
        assert_eq!(fields["status"], "queued");
        assert_eq!(fields["template"], "password_reset");
        assert_eq!(EmailJob::from_fields(fields).unwrap(), job);
    }

    #[test]
    fn test_reserved_extra_fields_are_ignored() {
        let job = EmailJob::new("s", "b").with_field("status", "sent");
        assert!(job.extra.is_empty());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_from_fields_requires_core_fields() {
        let fields = HashMap::from([("email".to_string(), "ada@example.com".to_string())]);
        let err = EmailJob::from_fields(fields).unwrap_err();

        assert!(matches!(err, DispatchError::InvalidRecord(msg) if msg.contains("subject")));
    }

    #[test]
    fn test_from_fields_rejects_unknown_status() {
        let mut fields: HashMap<_, _> = job().to_fields().into_iter().collect();
        fields.insert("status".into(), "bounced".into());

        assert!(EmailJob::from_fields(fields).is_err());
    }

    #[test]
    fn test_payload_roundtrip() {
        let job = job();
        let payload = job.to_payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["email"], "ada@example.com");
        assert_eq!(value["status"], "queued");
        assert_eq!(EmailJob::from_payload(&payload).unwrap(), Some(job));
    }

    #[test]
    fn test_falsy_payloads() {
        for payload in ["", "  ", "null", "{}", "[]", "false", "0", "\"\""] {
            assert_eq!(EmailJob::from_payload(payload).unwrap(), None, "{payload}");
        }
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(EmailJob::from_payload("not json").is_err());
        assert!(EmailJob::from_payload("[1, 2]").is_err());
        assert!(EmailJob::from_payload(r#"{"subject": "s", "body": "b"}"#).is_err());
    }

    #[test]
    fn test_payload_keeps_non_string_extras() {
        let payload = r#"{"email": "ada@example.com", "subject": "s", "body": "b", "attempt": 2, "note": null}"#;
        let job = EmailJob::from_payload(payload).unwrap().unwrap();

        assert_eq!(job.extra.get("attempt").map(String::as_str), Some("2"));
        assert!(!job.extra.contains_key("note"));
    }
}
