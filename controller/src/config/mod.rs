//! Layered retry settings
//!
//! 1. Defaults (from code)
//! 2. Config file (`retrykit.toml`)
//! 3. Environment variables (`RETRYKIT_*` prefix)
//!
//! ```no_run
//! use retrykit_controller::config::ConfigLoader;
//!
//! let settings = ConfigLoader::load_default()?;
//! let config = settings.to_controller_config()?;
//! # Ok::<(), retrykit_controller::config::ConfigError>(())
//! ```

pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, ENV_PREFIX, RetrySettings};
pub use validator::SchemaValidator;
