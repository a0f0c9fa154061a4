//! Configuration loading and management.

mod loader;
mod types;

pub use loader::{CONFIG_FILE_NAME, SYSTEM_CONFIG_PATH};
pub use types::{Config, Defaults, SwitchConfig, TemplateConfig};
