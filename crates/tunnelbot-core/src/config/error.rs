//! Configuration errors. All of them abort startup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported config format {extension:?} for {}; use .json/.ini/.xml", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("bot token is not set (DISCORD_BOT_TOKEN, TOKEN_FILE or config/token.txt)")]
    MissingToken,

    #[error("no channel runtime configured; set DISCORD_CONFIG_FILE or DISCORD_CHANNEL_ID")]
    NoRuntime,
}
