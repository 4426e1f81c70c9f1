//! Bus event types — messages flowing between transports and the bot.

use chrono::{DateTime, Utc};

/// An inbound chat message delivered by a transport.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Transport name (e.g. "discord").
    pub channel: String,
    /// Chat channel the message was posted in.
    pub channel_id: u64,
    /// Author identifier within the transport.
    pub author_id: String,
    /// Whether the bot's own account wrote this message.
    pub from_self: bool,
    /// Raw text content.
    pub content: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a new inbound message written by someone other than the bot.
    pub fn new(
        channel: impl Into<String>,
        channel_id: u64,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            channel_id,
            author_id: author_id.into(),
            from_self: false,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Mark the message as written by the bot itself.
    pub fn from_self(mut self) -> Self {
        self.from_self = true;
        self
    }
}

/// An outbound text message addressed to one chat channel.
///
/// `channel` names the transport that delivers it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub channel_id: u64,
    pub content: String,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, channel_id: u64, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            channel_id,
            content: content.into(),
        }
    }
}
