// Configuration management for the Product Fusion services

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{ENV_PREFIX, Settings};
pub use validation::{ConfigValidator, Validate};
