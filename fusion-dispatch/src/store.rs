//! Job store port.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::Result;

/// Prefix of every job key.
pub const KEY_PREFIX: &str = "email";

/// The store key for a recipient's job, `email:<recipient>`.
pub fn job_key(recipient: &str) -> String {
    format!("{}:{}", KEY_PREFIX, recipient)
}

/// Durable field-map storage for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Replace the record at `key` with exactly `fields`.
    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Set one field if the record exists. Returns whether it was written.
    async fn set_field_if_present(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Delete the record, returning how many fields it held.
    async fn delete_all_fields(&self, key: &str) -> Result<u64>;

    /// Read every field of the record. Missing records read as empty.
    async fn read_all_fields(&self, key: &str) -> Result<HashMap<String, String>>;
}
