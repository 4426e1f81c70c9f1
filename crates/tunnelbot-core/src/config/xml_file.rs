//! XML config format.
//!
//! ```xml
//! <config>
//!   <bot>
//!     <channel_id>123</channel_id>
//!     <announce_on_startup>true</announce_on_startup>
//!     <poll_seconds>20</poll_seconds>
//!   </bot>
//!   <services>
//!     <service key="api">
//!       <command>api</command>
//!       <label>API</label>
//!       <url_file>/run/api.url</url_file>
//!       <tunnel_log_file>/run/api.log</tunnel_log_file>
//!     </service>
//!   </services>
//!   <channels>
//!     <channel id="123">
//!       <module name="url_router" poll_seconds="30"/>
//!     </channel>
//!   </channels>
//! </config>
//! ```

use roxmltree::{Document, Node};
use tracing::debug;

use super::loader::{parse_bool, parse_channel_id, parse_u64};
use super::schema::{BotSettings, ChannelEntry, ModuleEntry, ModuleSettings, RouterConfig, ServiceEntry};

pub(super) fn parse_xml(content: &str) -> Result<RouterConfig, String> {
    let doc = Document::parse(content).map_err(|e| e.to_string())?;
    let root = doc.root_element();

    let bot = child(root, "bot").map(xml_bot).unwrap_or_default();

    let services = child(root, "services")
        .map(|list| children(list, "service").map(xml_service).collect())
        .unwrap_or_default();

    let channels = child(root, "channels")
        .map(|list| children(list, "channel").filter_map(xml_channel).collect())
        .unwrap_or_default();

    Ok(RouterConfig {
        bot,
        services,
        channels,
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

/// Trimmed text of the first `name` child; empty when absent.
fn child_text(node: Node<'_, '_>, name: &str) -> String {
    child(node, name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn xml_bot(node: Node<'_, '_>) -> BotSettings {
    let text = |name: &str| Some(child_text(node, name)).filter(|t| !t.is_empty());
    BotSettings {
        channel_id: text("channel_id").as_deref().and_then(parse_channel_id),
        announce_on_startup: text("announce_on_startup").as_deref().map(parse_bool),
        poll_seconds: text("poll_seconds").as_deref().and_then(parse_u64),
    }
}

fn xml_service(node: Node<'_, '_>) -> ServiceEntry {
    ServiceEntry {
        key: node.attribute("key").unwrap_or_default().trim().to_string(),
        command: child_text(node, "command"),
        label: child_text(node, "label"),
        url_file: child_text(node, "url_file"),
        tunnel_log_file: child_text(node, "tunnel_log_file"),
    }
}

fn xml_channel(node: Node<'_, '_>) -> Option<ChannelEntry> {
    let Some(id) = node.attribute("id").and_then(parse_channel_id) else {
        debug!(id = ?node.attribute("id"), "skipping channel element without a valid id");
        return None;
    };

    let modules = children(node, "module")
        .filter_map(|m| {
            let name = m.attribute("name").unwrap_or_default().trim();
            if name.is_empty() {
                return None;
            }
            Some(ModuleEntry {
                name: name.to_string(),
                settings: ModuleSettings {
                    services_file: m
                        .attribute("services_file")
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from),
                    announce_on_startup: m.attribute("announce_on_startup").map(parse_bool),
                    poll_seconds: m.attribute("poll_seconds").and_then(parse_u64),
                },
            })
        })
        .collect();

    Some(ChannelEntry { id, modules })
}
