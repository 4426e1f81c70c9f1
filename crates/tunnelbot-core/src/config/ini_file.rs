//! INI config format.
//!
//! ```ini
//! [bot]
//! channel_id = 123
//! announce_on_startup = true
//! poll_seconds = 20
//!
//! [service:api]
//! command = api
//! label = API
//! url_file = /run/api.url
//! tunnel_log_file = /run/api.log
//!
//! [channel:123]
//! modules = url_router
//! ```

use ini::{Ini, ParseOption, Properties};
use tracing::debug;

use super::loader::{parse_bool, parse_channel_id, parse_u64};
use super::schema::{BotSettings, ChannelEntry, ModuleEntry, RouterConfig, ServiceEntry};

const DEFAULT_MODULES: &str = "url_router";

pub(super) fn parse_ini(content: &str) -> Result<RouterConfig, String> {
    // Escapes stay off so Windows paths survive verbatim.
    let options = ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    };
    let doc = Ini::load_from_str_opt(content, options).map_err(|e| e.to_string())?;

    let mut config = RouterConfig::default();

    for (section, props) in doc.iter() {
        let Some(section) = section.map(str::trim) else {
            continue;
        };

        if section == "bot" {
            config.bot = ini_bot(props);
        } else if let Some(key) = section.strip_prefix("service:") {
            config.services.push(ini_service(key.trim(), props));
        } else if let Some(id) = section.strip_prefix("channel:") {
            match parse_channel_id(id) {
                Some(id) => config.channels.push(ini_channel(id, props)),
                None => debug!(section = %section, "skipping channel section without a valid id"),
            }
        }
    }

    Ok(config)
}

fn ini_bot(props: &Properties) -> BotSettings {
    BotSettings {
        channel_id: props.get("channel_id").and_then(parse_channel_id),
        announce_on_startup: props.get("announce_on_startup").map(parse_bool),
        poll_seconds: props.get("poll_seconds").and_then(parse_u64),
    }
}

fn ini_service(key: &str, props: &Properties) -> ServiceEntry {
    let or_key = |name: &str| {
        props
            .get(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(key)
            .to_string()
    };
    let plain = |name: &str| props.get(name).unwrap_or_default().trim().to_string();

    ServiceEntry {
        key: key.to_string(),
        command: or_key("command"),
        label: or_key("label"),
        url_file: plain("url_file"),
        tunnel_log_file: plain("tunnel_log_file"),
    }
}

fn ini_channel(id: u64, props: &Properties) -> ChannelEntry {
    let modules = props
        .get("modules")
        .unwrap_or(DEFAULT_MODULES)
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ModuleEntry::named)
        .collect();
    ChannelEntry { id, modules }
}
