//! Message bus — event types and the queue connecting transports to the bot.

pub mod queue;
pub mod types;

pub use queue::MessageBus;
pub use types::{InboundMessage, OutboundMessage};
