//! # Product Fusion
//!
//! Transactional email dispatch for the Product Fusion backend.
//!
//! This crate re-exports the workspace members so the dispatcher binary and
//! its callers can depend on a single crate:
//!
//! - [`log`] - process-wide `tracing` setup
//! - [`config`] - typed settings loaded from files and `FUSION_*` variables
//! - [`redis`] - pooled Redis connections, hash helpers and pub/sub
//! - [`mail`] - email messages, SMTP transport and transactional templates
//! - [`dispatch`] - the job store, notification channel and dispatch service
//!
//! ## Example
//!
//! ```rust,no_run
//! use product_fusion::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load()?;
//!     let redis = RedisConfig::builder().url(&settings.redis_url).build();
//!     let redis = Arc::new(RedisService::new(redis).await?);
//!     let mailer = Mailer::smtp(SmtpConfig::new(&settings.smtp_server))?;
//!
//!     let dispatch = DispatchService::redis(redis, mailer);
//!     dispatch.start().await?;
//!     dispatch
//!         .queue("ada@example.com", EmailJob::new("Hello", "<p>Hi Ada</p>"))
//!         .await?;
//!     dispatch.stop().await;
//!     Ok(())
//! }
//! ```

pub use fusion_config as config;
pub use fusion_dispatch as dispatch;
pub use fusion_log as log;
pub use fusion_mail as mail;
pub use fusion_redis as redis;

/// Prelude for common imports.
pub mod prelude {
    pub use fusion_config::{Settings, Validate};
    pub use fusion_dispatch::prelude::*;
    pub use fusion_log::{Level, LogConfig};
    pub use fusion_mail::{
        HandlebarsEngine, Mailer, SmtpConfig, SmtpSecurity, TemplateEngine, templates,
    };
    pub use fusion_redis::{RedisConfig, RedisService};
}
