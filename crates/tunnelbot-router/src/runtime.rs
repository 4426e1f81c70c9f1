//! Channel runtimes — which modules answer in which chat channel.
//!
//! Built once at startup from the config record. When the record yields
//! no runtime at all, a single fallback runtime is bound to the default
//! channel.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tunnelbot_core::config::{ConfigError, ModuleDefaults, ModuleEntry, RouterConfig, StartupOptions};
use tunnelbot_core::registry::{load_service_registry, ServiceUrlRegistry};

use crate::module::BotModule;
use crate::url_router::{UrlRouterModule, URL_ROUTER_MODULE};

/// One chat channel and its modules, in dispatch order.
#[derive(Clone)]
pub struct ChannelRuntime {
    pub channel_id: u64,
    pub modules: Vec<Arc<dyn BotModule>>,
}

impl ChannelRuntime {
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }
}

impl std::fmt::Debug for ChannelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRuntime")
            .field("channel_id", &self.channel_id)
            .field("modules", &self.module_names())
            .finish()
    }
}

// ─────────────────────────────────────────────
// Module kinds
// ─────────────────────────────────────────────

/// Every module the bot knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    UrlRouter,
}

impl ModuleKind {
    /// Map a config module name (case-insensitive) to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            URL_ROUTER_MODULE => Some(Self::UrlRouter),
            _ => None,
        }
    }

    /// Build a module instance from a config entry.
    ///
    /// A `services_file` setting gives the instance its own registry;
    /// otherwise it shares `registry`.
    pub fn build(
        self,
        entry: &ModuleEntry,
        defaults: ModuleDefaults,
        registry: &Arc<ServiceUrlRegistry>,
    ) -> Arc<dyn BotModule> {
        match self {
            Self::UrlRouter => {
                let registry = match &entry.settings.services_file {
                    Some(file) => Arc::new(load_service_registry(Path::new(file))),
                    None => registry.clone(),
                };
                Arc::new(UrlRouterModule::new(registry, defaults.apply(&entry.settings)))
            }
        }
    }
}

// ─────────────────────────────────────────────
// Building
// ─────────────────────────────────────────────

/// Build runtimes for every configured channel, in config order.
pub fn build_channel_runtimes(
    config: &RouterConfig,
    defaults: ModuleDefaults,
    registry: &Arc<ServiceUrlRegistry>,
) -> Vec<ChannelRuntime> {
    let mut runtimes: Vec<ChannelRuntime> = Vec::new();

    for channel in &config.channels {
        let modules: Vec<Arc<dyn BotModule>> = channel
            .modules
            .iter()
            .filter_map(|entry| match ModuleKind::from_name(&entry.name) {
                Some(kind) => Some(kind.build(entry, defaults, registry)),
                None => {
                    warn!(
                        channel_id = channel.id,
                        module = %entry.name,
                        "unknown module, skipping"
                    );
                    None
                }
            })
            .collect();

        if modules.is_empty() {
            warn!(
                channel_id = channel.id,
                "channel has no usable modules, dropping it"
            );
            continue;
        }

        let runtime = ChannelRuntime {
            channel_id: channel.id,
            modules,
        };
        debug!(runtime = ?runtime, "built channel runtime");

        match runtimes.iter_mut().find(|r| r.channel_id == channel.id) {
            Some(existing) => {
                warn!(channel_id = channel.id, "channel configured twice, keeping last");
                *existing = runtime;
            }
            None => runtimes.push(runtime),
        }
    }

    info!(channels = runtimes.len(), "channel runtimes built");
    runtimes
}

/// The single runtime used when the config binds no channel.
///
/// Channel: config `bot.channel_id`, else the startup default. Registry:
/// `registry` when it has services, else the legacy services file.
pub fn fallback_runtime(
    config: &RouterConfig,
    startup: &StartupOptions,
    defaults: ModuleDefaults,
    registry: &Arc<ServiceUrlRegistry>,
) -> Result<ChannelRuntime, ConfigError> {
    let channel_id = config
        .bot
        .channel_id
        .or(startup.default_channel_id)
        .filter(|&id| id > 0)
        .ok_or(ConfigError::NoRuntime)?;

    let registry = if registry.is_empty() {
        info!(path = %startup.services_file, "no services in config, trying legacy services file");
        Arc::new(load_service_registry(Path::new(&startup.services_file)))
    } else {
        registry.clone()
    };

    info!(channel_id = channel_id, services = registry.len(), "using fallback channel runtime");
    Ok(ChannelRuntime {
        channel_id,
        modules: vec![Arc::new(UrlRouterModule::new(registry, defaults))],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tunnelbot_core::config::{BotSettings, ChannelEntry, ModuleSettings, ServiceEntry};

    fn defaults() -> ModuleDefaults {
        ModuleDefaults {
            announce_on_startup: true,
            poll_seconds: 20,
        }
    }

    fn service_entry(key: &str) -> ServiceEntry {
        ServiceEntry {
            key: key.into(),
            command: key.into(),
            label: key.to_uppercase(),
            url_file: format!("/tmp/{key}.url"),
            tunnel_log_file: format!("/tmp/{key}.log"),
        }
    }

    fn channel(id: u64, modules: &[&str]) -> ChannelEntry {
        ChannelEntry {
            id,
            modules: modules.iter().map(|m| ModuleEntry::named(*m)).collect(),
        }
    }

    #[test]
    fn test_module_kind_from_name() {
        assert_eq!(ModuleKind::from_name("url_router"), Some(ModuleKind::UrlRouter));
        assert_eq!(ModuleKind::from_name(" URL_Router "), Some(ModuleKind::UrlRouter));
        assert_eq!(ModuleKind::from_name("music"), None);
    }

    #[test]
    fn test_build_runtimes_in_order() {
        let config = RouterConfig {
            channels: vec![channel(10, &["url_router"]), channel(20, &["url_router", "url_router"])],
            ..Default::default()
        };
        let registry = Arc::new(ServiceUrlRegistry::from_entries(&[service_entry("api")]));

        let runtimes = build_channel_runtimes(&config, defaults(), &registry);
        assert_eq!(runtimes.len(), 2);
        assert_eq!(runtimes[0].channel_id, 10);
        assert_eq!(runtimes[1].module_names(), vec!["url_router", "url_router"]);
    }

    #[test]
    fn test_unknown_modules_and_empty_channels_dropped() {
        let config = RouterConfig {
            channels: vec![
                channel(10, &["music", "url_router"]),
                channel(20, &["music"]),
                channel(30, &[]),
            ],
            ..Default::default()
        };
        let registry = Arc::new(ServiceUrlRegistry::default());

        let runtimes = build_channel_runtimes(&config, defaults(), &registry);
        assert_eq!(runtimes.len(), 1);
        assert_eq!(runtimes[0].channel_id, 10);
        assert_eq!(runtimes[0].modules.len(), 1);
    }

    #[test]
    fn test_duplicate_channel_keeps_last() {
        let config = RouterConfig {
            channels: vec![
                channel(10, &["url_router"]),
                channel(20, &["url_router"]),
                channel(10, &["url_router", "url_router"]),
            ],
            ..Default::default()
        };
        let registry = Arc::new(ServiceUrlRegistry::default());

        let runtimes = build_channel_runtimes(&config, defaults(), &registry);
        assert_eq!(runtimes.len(), 2);
        assert_eq!(runtimes[0].channel_id, 10);
        assert_eq!(runtimes[0].modules.len(), 2);
    }

    #[tokio::test]
    async fn test_services_file_setting_loads_own_registry() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("extra.json");
        fs::write(
            &file,
            r#"{"services": [{"key": "db", "command": "db", "url_file": "/a", "tunnel_log_file": "/b"}]}"#,
        )
        .unwrap();

        let entry = ModuleEntry {
            name: "url_router".into(),
            settings: ModuleSettings {
                services_file: Some(file.to_string_lossy().into_owned()),
                ..Default::default()
            },
        };
        let shared = Arc::new(ServiceUrlRegistry::default());

        // The built module answers `!db`, which only the dedicated file defines.
        let module = ModuleKind::UrlRouter.build(&entry, defaults(), &shared);
        let bus = Arc::new(tunnelbot_core::bus::queue::MessageBus::new(4));
        let ctx = crate::module::BotContext::new(
            bus,
            Arc::new(tunnelbot_core::link::LinkState::new()),
            "discord",
        );
        assert!(module.handle_command(&ctx, 1, "db", "").await.unwrap());
    }

    #[test]
    fn test_fallback_prefers_config_channel() {
        let config = RouterConfig {
            bot: BotSettings {
                channel_id: Some(555),
                ..Default::default()
            },
            ..Default::default()
        };
        let startup = StartupOptions {
            default_channel_id: Some(777),
            ..Default::default()
        };
        let registry = Arc::new(ServiceUrlRegistry::from_entries(&[service_entry("api")]));

        let runtime = fallback_runtime(&config, &startup, defaults(), &registry).unwrap();
        assert_eq!(runtime.channel_id, 555);
        assert_eq!(runtime.module_names(), vec!["url_router"]);
    }

    #[test]
    fn test_fallback_uses_startup_channel() {
        let startup = StartupOptions {
            default_channel_id: Some(777),
            services_file: "/nonexistent/services.json".into(),
            ..Default::default()
        };
        let registry = Arc::new(ServiceUrlRegistry::default());

        let runtime =
            fallback_runtime(&RouterConfig::default(), &startup, defaults(), &registry).unwrap();
        assert_eq!(runtime.channel_id, 777);
    }

    #[test]
    fn test_fallback_without_channel_fails() {
        let startup = StartupOptions::default();
        let registry = Arc::new(ServiceUrlRegistry::default());

        let err = fallback_runtime(&RouterConfig::default(), &startup, defaults(), &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoRuntime));
    }
}
