//! Service registry — the fixed set of services whose public URL is tracked.
//!
//! Built once at startup and read-only afterwards, so it is shared freely
//! behind an `Arc` across the dispatcher and every watch loop.
//!
//! Both lookup indices are exact projections of the ordered service list.
//! A duplicate key or command keeps the entry inserted last.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::schema::ServiceEntry;
use crate::config::load_router_config;
use crate::resolver::PublicUrlResolver;

/// One tracked service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Lowercase internal identifier (`!weburl <key>`).
    pub key: String,
    /// Lowercase chat alias (`!<command>`).
    pub command: String,
    /// Display name used in replies.
    pub label: String,
    /// File whose whole trimmed content is the URL.
    pub url_file: String,
    /// Tunnel log scraped for a quick-tunnel URL.
    pub tunnel_log_file: String,
}

impl ServiceTarget {
    /// Normalize a raw config entry. `None` when a required field is blank.
    pub fn from_entry(entry: &ServiceEntry) -> Option<Self> {
        let key = entry.key.trim().to_lowercase();
        let command = entry.command.trim().to_lowercase();
        let label = match entry.label.trim() {
            "" => key.clone(),
            label => label.to_string(),
        };
        let url_file = entry.url_file.trim().to_string();
        let tunnel_log_file = entry.tunnel_log_file.trim().to_string();

        if key.is_empty() || command.is_empty() || url_file.is_empty() || tunnel_log_file.is_empty() {
            return None;
        }

        Some(Self {
            key,
            command,
            label,
            url_file,
            tunnel_log_file,
        })
    }

    /// Resolver over this service's URL sources.
    pub fn resolver(&self) -> PublicUrlResolver {
        PublicUrlResolver::new(&self.url_file, &self.tunnel_log_file)
    }
}

/// Ordered services plus key/command indices.
#[derive(Clone, Debug, Default)]
pub struct ServiceUrlRegistry {
    services: Vec<ServiceTarget>,
    by_key: HashMap<String, usize>,
    by_command: HashMap<String, usize>,
}

impl ServiceUrlRegistry {
    /// Build the registry and both indices.
    pub fn new(services: Vec<ServiceTarget>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_command = HashMap::new();
        for (idx, service) in services.iter().enumerate() {
            if let Some(prev) = by_key.insert(service.key.clone(), idx) {
                warn!(key = %service.key, replaced = prev, "duplicate service key, keeping last");
            }
            if let Some(prev) = by_command.insert(service.command.clone(), idx) {
                warn!(command = %service.command, replaced = prev, "duplicate service command, keeping last");
            }
        }
        Self {
            services,
            by_key,
            by_command,
        }
    }

    /// Build from raw config entries, skipping incomplete ones.
    pub fn from_entries(entries: &[ServiceEntry]) -> Self {
        let services: Vec<ServiceTarget> = entries
            .iter()
            .filter_map(|entry| {
                let target = ServiceTarget::from_entry(entry);
                if target.is_none() {
                    debug!(key = %entry.key, "skipping incomplete service entry");
                }
                target
            })
            .collect();
        Self::new(services)
    }

    /// Services in configured order.
    pub fn services(&self) -> &[ServiceTarget] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Look up a service by key (case-insensitive).
    pub fn by_key(&self, key: &str) -> Option<&ServiceTarget> {
        self.by_key
            .get(&key.trim().to_lowercase())
            .map(|&idx| &self.services[idx])
    }

    /// Look up a service by command alias (case-insensitive).
    pub fn by_command(&self, command: &str) -> Option<&ServiceTarget> {
        self.by_command
            .get(&command.trim().to_lowercase())
            .map(|&idx| &self.services[idx])
    }

    /// Resolve a service's current public URL.
    pub fn read_url(&self, service: &ServiceTarget) -> Option<String> {
        service.resolver().resolve()
    }
}

/// Build a registry from the `services` list of any supported config file.
///
/// Load failures are logged and produce an empty registry.
pub fn load_service_registry(path: &Path) -> ServiceUrlRegistry {
    match load_router_config(path) {
        Ok(config) => {
            let registry = ServiceUrlRegistry::from_entries(&config.services);
            info!(path = %path.display(), services = registry.len(), "loaded services file");
            registry
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load services file");
            ServiceUrlRegistry::default()
        }
    }
}
