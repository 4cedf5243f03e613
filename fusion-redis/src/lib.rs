//! # Fusion Redis
//!
//! Redis substrate for Product Fusion: a bb8 connection pool, the hash
//! operations behind the email job store and channel pub/sub.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fusion_redis::{RedisConfig, RedisService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let redis = RedisService::new(config).await?;
//!
//!     redis
//!         .replace_hash("email:ada@example.com", &[("status".into(), "queued".into())])
//!         .await?;
//!     redis.publish("email-channel", "{}").await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pool;
mod pubsub;
mod service;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{RedisConnection, RedisPool, RedisPoolBuilder};
pub use pubsub::{Message, PubSub, Subscription};
pub use service::{PoolStats, RedisService};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use fusion_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::RedisError;
    pub use crate::pubsub::{Message, PubSub, Subscription};
    pub use crate::service::RedisService;
}
