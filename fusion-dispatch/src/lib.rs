//! # Fusion Dispatch
//!
//! Asynchronous email dispatch for Product Fusion.
//!
//! Request handlers queue email jobs; each job is written to a job store
//! under `email:<recipient>` with status `queued` and a copy is published on
//! the `email-channel` notification channel. A single background subscriber
//! receives the copy, sends the email and marks the job `sent`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fusion_dispatch::{DispatchService, EmailJob};
//! use fusion_mail::{Mailer, SmtpConfig};
//! use fusion_redis::{RedisConfig, RedisService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let redis = Arc::new(RedisService::new(RedisConfig::from_env().build()).await?);
//!     let mailer = Mailer::smtp(SmtpConfig::new("smtp.example.com"))?
//!         .default_from("noreply@example.com")?;
//!
//!     let dispatch = DispatchService::redis(redis, mailer);
//!     dispatch.start().await?;
//!
//!     dispatch
//!         .queue("ada@example.com", EmailJob::new("Password Updated", "<p>Done.</p>"))
//!         .await?;
//!
//!     dispatch.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Substrates
//!
//! The store and channel are ports ([`JobStore`], [`NotificationChannel`]).
//! [`RedisJobStore`] and [`RedisChannel`] run against Redis;
//! [`MemorySubstrate`] implements both in process.

mod channel;
mod error;
mod job;
mod memory;
mod redis;
mod service;
mod store;
mod subscriber;
mod transport;

pub use channel::{
    ChannelMessage, ChannelSubscription, EMAIL_CHANNEL, MessageKind, NotificationChannel,
};
pub use error::{DispatchError, Result};
pub use job::{EmailJob, FIELD_BODY, FIELD_EMAIL, FIELD_STATUS, FIELD_SUBJECT, JobStatus};
pub use memory::MemorySubstrate;
pub use redis::{RedisChannel, RedisJobStore};
pub use service::{DispatchService, DispatchStats};
pub use store::{JobStore, KEY_PREFIX, job_key};
pub use subscriber::{SubscriberExit, SubscriberState};
pub use transport::MailTransport;

pub use fusion_mail::Delivery;

/// Prelude for common imports.
///
/// ```
/// use fusion_dispatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::channel::{EMAIL_CHANNEL, NotificationChannel};
    pub use crate::error::DispatchError;
    pub use crate::job::{EmailJob, JobStatus};
    pub use crate::memory::MemorySubstrate;
    pub use crate::service::{DispatchService, DispatchStats};
    pub use crate::store::JobStore;
    pub use crate::subscriber::{SubscriberExit, SubscriberState};
    pub use crate::transport::MailTransport;
    pub use fusion_mail::Delivery;
}
