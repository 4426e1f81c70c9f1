//! Config loader — picks a format by file extension and builds a `RouterConfig`.
//!
//! # Loading rules
//! 1. Missing file → empty record (the caller falls back to startup options)
//! 2. `.json` / `.ini` / `.xml` (any case) → matching loader
//! 3. Any other extension → `ConfigError::UnsupportedFormat`
//!
//! Individual entries are lenient: a channel with a non-numeric id or a
//! module without a name is dropped, the rest of the file still loads.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use super::error::ConfigError;
use super::schema::{
    BotSettings, ChannelEntry, ModuleEntry, ModuleSettings, RouterConfig, ServiceEntry,
};

/// Load the router config from `path`.
pub fn load_router_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Ok(RouterConfig::default());
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let parse: fn(&str) -> Result<RouterConfig, String> = match extension.as_str() {
        "json" => parse_json,
        "ini" => super::ini_file::parse_ini,
        "xml" => super::xml_file::parse_xml,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: format!(".{extension}"),
            })
        }
    };

    debug!("Loading config from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let config = parse(content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    info!(
        path = %path.display(),
        services = config.services.len(),
        channels = config.channels.len(),
        "loaded router config"
    );
    Ok(config)
}

// ─────────────────────────────────────────────
// Lenient scalar parsing (shared by all formats)
// ─────────────────────────────────────────────

/// `1/true/yes/on` (any case) → true, anything else → false.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn parse_u64(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// A positive channel id; zero or garbage yields `None`.
pub fn parse_channel_id(raw: &str) -> Option<u64> {
    parse_u64(raw).filter(|&id| id > 0)
}

// ─────────────────────────────────────────────
// JSON
// ─────────────────────────────────────────────

fn parse_json(content: &str) -> Result<RouterConfig, String> {
    let raw: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let Some(root) = raw.as_object() else {
        return Ok(RouterConfig::default());
    };

    let bot = root.get("bot").map(json_bot).unwrap_or_default();

    let services = root
        .get("services")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|v| v.is_object()).map(json_service).collect())
        .unwrap_or_default();

    let channels = root
        .get("channels")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(json_channel).collect())
        .unwrap_or_default();

    Ok(RouterConfig {
        bot,
        services,
        channels,
    })
}

fn json_bot(value: &Value) -> BotSettings {
    BotSettings {
        channel_id: value.get("channel_id").and_then(json_u64).filter(|&id| id > 0),
        announce_on_startup: value.get("announce_on_startup").and_then(json_bool),
        poll_seconds: value.get("poll_seconds").and_then(json_u64),
    }
}

fn json_service(value: &Value) -> ServiceEntry {
    let field = |name: &str| value.get(name).map(json_string).unwrap_or_default();
    ServiceEntry {
        key: field("key"),
        command: field("command"),
        label: field("label"),
        url_file: field("url_file"),
        tunnel_log_file: field("tunnel_log_file"),
    }
}

fn json_channel(value: &Value) -> Option<ChannelEntry> {
    let id = value.get("id").and_then(json_u64).filter(|&id| id > 0);
    let Some(id) = id else {
        debug!(entry = %value, "skipping channel without a valid id");
        return None;
    };

    let modules = value
        .get("modules")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(json_module).collect())
        .unwrap_or_default();

    Some(ChannelEntry { id, modules })
}

fn json_module(value: &Value) -> Option<ModuleEntry> {
    let entry = match value {
        Value::String(name) => ModuleEntry::named(name.trim()),
        Value::Object(map) => {
            let name = map.get("name").map(json_string).unwrap_or_default();
            let settings = map.get("settings").map(json_module_settings).unwrap_or_default();
            ModuleEntry {
                name: name.trim().to_string(),
                settings,
            }
        }
        _ => return None,
    };
    (!entry.name.is_empty()).then_some(entry)
}

fn json_module_settings(value: &Value) -> ModuleSettings {
    ModuleSettings {
        services_file: value
            .get("services_file")
            .map(json_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        announce_on_startup: value.get("announce_on_startup").and_then(json_bool),
        poll_seconds: value.get("poll_seconds").and_then(json_u64),
    }
}

fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_u64(s),
        _ => None,
    }
}

fn json_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Some(parse_bool(s)),
        _ => None,
    }
}

fn json_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
