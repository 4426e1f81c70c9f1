//! Configuration schema — the format-independent config record.
//!
//! Hierarchy: `RouterConfig` → `BotSettings`, `ServiceEntry`, `ChannelEntry`
//! → `ModuleEntry` → `ModuleSettings`.
//!
//! Every loader (JSON, INI, XML) produces this record. Optional fields stay
//! `None` when a file does not set them, so the caller can layer defaults.

use serde::{Deserialize, Serialize};

/// Floor applied to every poll interval, in seconds.
pub const MIN_POLL_SECONDS: u64 = 5;

/// Poll interval used when nothing configures one.
pub const DEFAULT_POLL_SECONDS: u64 = 20;

/// Default router config path.
pub const DEFAULT_CONFIG_FILE: &str = "config/discord_router_config.json";

/// Default legacy services-only file.
pub const DEFAULT_SERVICES_FILE: &str = "config/discord_services.json";

/// Clamp a configured poll interval to the enforced floor.
pub fn clamp_poll_seconds(seconds: u64) -> u64 {
    seconds.max(MIN_POLL_SECONDS)
}

// ─────────────────────────────────────────────
// Root record
// ─────────────────────────────────────────────

/// Root configuration record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub bot: BotSettings,
    pub services: Vec<ServiceEntry>,
    pub channels: Vec<ChannelEntry>,
}

impl RouterConfig {
    /// Whether the record carries nothing at all (e.g. the file was missing).
    pub fn is_empty(&self) -> bool {
        *self == RouterConfig::default()
    }
}

/// Bot-wide settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Channel used when no `channels` entry is configured.
    pub channel_id: Option<u64>,
    pub announce_on_startup: Option<bool>,
    pub poll_seconds: Option<u64>,
}

/// A raw service entry. Validation happens in the registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEntry {
    pub key: String,
    pub command: String,
    pub label: String,
    pub url_file: String,
    pub tunnel_log_file: String,
}

/// One chat channel and the modules bound to it, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelEntry {
    pub id: u64,
    pub modules: Vec<ModuleEntry>,
}

/// A module reference with optional per-module settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleEntry {
    pub name: String,
    pub settings: ModuleSettings,
}

impl ModuleEntry {
    /// A module entry without settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: ModuleSettings::default(),
        }
    }
}

/// Per-module overrides of the bot-wide settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Dedicated services file for this module instance.
    pub services_file: Option<String>,
    pub announce_on_startup: Option<bool>,
    pub poll_seconds: Option<u64>,
}

// ─────────────────────────────────────────────
// Startup options
// ─────────────────────────────────────────────

/// Environment-style parameters read once at process start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartupOptions {
    /// Bot token given directly.
    pub token: Option<String>,
    /// File holding the bot token.
    pub token_file: Option<String>,
    /// Channel used for the fallback runtime.
    pub default_channel_id: Option<u64>,
    pub config_file: String,
    /// Legacy services-only file, consulted when the config has no services.
    pub services_file: String,
    pub announce_on_startup: bool,
    pub poll_seconds: u64,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            default_channel_id: None,
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            services_file: DEFAULT_SERVICES_FILE.to_string(),
            announce_on_startup: true,
            poll_seconds: DEFAULT_POLL_SECONDS,
        }
    }
}

/// Announce/poll defaults after layering config `bot` over startup options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleDefaults {
    pub announce_on_startup: bool,
    /// Already clamped to `MIN_POLL_SECONDS`.
    pub poll_seconds: u64,
}

impl ModuleDefaults {
    /// Config `bot` settings win over startup options.
    pub fn layered(bot: &BotSettings, startup: &StartupOptions) -> Self {
        Self {
            announce_on_startup: bot.announce_on_startup.unwrap_or(startup.announce_on_startup),
            poll_seconds: clamp_poll_seconds(bot.poll_seconds.unwrap_or(startup.poll_seconds)),
        }
    }

    /// Module settings win over these defaults.
    pub fn apply(&self, settings: &ModuleSettings) -> Self {
        Self {
            announce_on_startup: settings.announce_on_startup.unwrap_or(self.announce_on_startup),
            poll_seconds: clamp_poll_seconds(settings.poll_seconds.unwrap_or(self.poll_seconds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_poll_seconds() {
        assert_eq!(clamp_poll_seconds(2), 5);
        assert_eq!(clamp_poll_seconds(0), 5);
        assert_eq!(clamp_poll_seconds(5), 5);
        assert_eq!(clamp_poll_seconds(30), 30);
    }

    #[test]
    fn test_default_record_is_empty() {
        assert!(RouterConfig::default().is_empty());
        let mut config = RouterConfig::default();
        config.bot.poll_seconds = Some(10);
        assert!(!config.is_empty());
    }

    #[test]
    fn test_startup_defaults() {
        let opts = StartupOptions::default();
        assert_eq!(opts.config_file, "config/discord_router_config.json");
        assert_eq!(opts.services_file, "config/discord_services.json");
        assert!(opts.announce_on_startup);
        assert_eq!(opts.poll_seconds, 20);
    }

    #[test]
    fn test_module_defaults_layering() {
        let startup = StartupOptions {
            announce_on_startup: false,
            poll_seconds: 3,
            ..StartupOptions::default()
        };
        let bot = BotSettings::default();
        let defaults = ModuleDefaults::layered(&bot, &startup);
        assert!(!defaults.announce_on_startup);
        assert_eq!(defaults.poll_seconds, 5);

        let bot = BotSettings {
            channel_id: None,
            announce_on_startup: Some(true),
            poll_seconds: Some(45),
        };
        let defaults = ModuleDefaults::layered(&bot, &startup);
        assert!(defaults.announce_on_startup);
        assert_eq!(defaults.poll_seconds, 45);

        let settings = ModuleSettings {
            services_file: None,
            announce_on_startup: Some(false),
            poll_seconds: Some(2),
        };
        let module = defaults.apply(&settings);
        assert!(!module.announce_on_startup);
        assert_eq!(module.poll_seconds, 5);
    }
}
