//! Tunnelbot Core — shared building blocks for the bot.
//!
//! - **bus**: inbound/outbound message types and the async `MessageBus`
//! - **link**: connection state shared between a transport and the bot
//! - **config**: the router config record, its JSON/INI/XML loaders and startup options
//! - **registry**: `ServiceTarget` definitions and the `ServiceUrlRegistry`
//! - **resolver**: `PublicUrlResolver`, which reads a service's current public URL

pub mod bus;
pub mod config;
pub mod link;
pub mod registry;
pub mod resolver;
pub mod utils;

pub use link::LinkState;
pub use registry::{ServiceTarget, ServiceUrlRegistry};
pub use resolver::PublicUrlResolver;
