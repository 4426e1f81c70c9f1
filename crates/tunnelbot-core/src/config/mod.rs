//! Configuration system — config record, format loaders, startup credentials.
//!
//! # Usage
//! ```no_run
//! use std::path::Path;
//! use tunnelbot_core::config;
//!
//! let cfg = config::load_router_config(Path::new("config/discord_router_config.json")).unwrap();
//! println!("Services: {}", cfg.services.len());
//! ```

pub mod credentials;
pub mod error;
pub mod loader;
pub mod schema;

mod ini_file;
mod xml_file;

// Re-export key types
pub use credentials::resolve_token;
pub use error::ConfigError;
pub use loader::{load_router_config, parse_bool, parse_channel_id};
pub use schema::{
    clamp_poll_seconds, BotSettings, ChannelEntry, ModuleDefaults, ModuleEntry, ModuleSettings,
    RouterConfig, ServiceEntry, StartupOptions,
};
