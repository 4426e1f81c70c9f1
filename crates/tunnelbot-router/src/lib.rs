//! Tunnelbot Router — what the bot does with chat messages.
//!
//! - **module**: the `BotModule` capability trait and the `BotContext` handed to it
//! - **url_router**: `UrlRouterModule`, which answers URL commands and announces changes
//! - **runtime**: per-channel module lists built from the config record
//! - **dispatcher**: routes inbound `!` commands to a channel's modules

pub mod dispatcher;
pub mod module;
pub mod runtime;
pub mod url_router;

pub use dispatcher::{parse_command, Dispatcher};
pub use module::{BotContext, BotModule};
pub use runtime::{build_channel_runtimes, fallback_runtime, ChannelRuntime, ModuleKind};
pub use url_router::{AnnouncePolicy, UrlRouterModule};
