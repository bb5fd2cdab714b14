//! Engine configuration: supported extensions, store location, cache
//! validity window.

pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, default_config_path, default_db_path};
pub use types::IndexConfig;
