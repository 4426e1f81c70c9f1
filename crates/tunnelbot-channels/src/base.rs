//! Channel trait — what the bot needs from a chat transport.
//!
//! A transport connects with its credentials, turns platform events into
//! `InboundMessage`s on the bus, and delivers `OutboundMessage`s addressed
//! to its `name()`. It also owns the `LinkState` writes: ready once logged
//! in, closed when `start()` returns.

use async_trait::async_trait;
use tunnelbot_core::bus::types::OutboundMessage;

/// A chat transport, held by the `ChannelManager` as `Arc<dyn Channel>`.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Name outbound messages use to address this transport (e.g. "discord").
    fn name(&self) -> &str;

    /// Connect and pump inbound messages until stopped or the connection dies.
    async fn start(&self) -> anyhow::Result<()>;

    /// Ask a running `start()` to return.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Post one text message to `msg.channel_id`.
    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;
}
