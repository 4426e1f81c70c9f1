//! Bot module trait — the capability interface every channel module implements.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use tunnelbot_core::bus::queue::MessageBus;
use tunnelbot_core::bus::types::OutboundMessage;
use tunnelbot_core::link::LinkState;

// ─────────────────────────────────────────────
// BotContext
// ─────────────────────────────────────────────

/// What a module may touch: the outbound queue and the connection state.
#[derive(Clone)]
pub struct BotContext {
    bus: Arc<MessageBus>,
    link: Arc<LinkState>,
    /// Transport name outbound messages are addressed to.
    transport: String,
}

impl BotContext {
    pub fn new(bus: Arc<MessageBus>, link: Arc<LinkState>, transport: impl Into<String>) -> Self {
        Self {
            bus,
            link,
            transport: transport.into(),
        }
    }

    /// Queue a text message for a chat channel.
    pub async fn send(&self, channel_id: u64, text: impl Into<String>) -> anyhow::Result<()> {
        let msg = OutboundMessage::new(&self.transport, channel_id, text);
        self.bus
            .publish_outbound(msg)
            .await
            .context("outbound queue closed")
    }

    /// Whether the chat connection has closed.
    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    pub fn link(&self) -> &Arc<LinkState> {
        &self.link
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }
}

// ─────────────────────────────────────────────
// BotModule trait
// ─────────────────────────────────────────────

/// A unit of bot behavior bound to one chat channel.
///
/// The dispatcher calls `on_ready` once per channel after login, and
/// `handle_command` for each `!` command posted in that channel, trying
/// modules in configured order until one claims the command.
#[async_trait]
pub trait BotModule: Send + Sync {
    /// Module name as written in config (e.g. `"url_router"`).
    fn name(&self) -> &str;

    /// Called once the connection is ready.
    async fn on_ready(&self, _ctx: &BotContext, _channel_id: u64) {}

    /// Handle `!<command> <args>`. `Ok(true)` claims the command.
    async fn handle_command(
        &self,
        ctx: &BotContext,
        channel_id: u64,
        command: &str,
        args: &str,
    ) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModule;

    #[async_trait]
    impl BotModule for EchoModule {
        fn name(&self) -> &str {
            "echo"
        }

        async fn handle_command(
            &self,
            ctx: &BotContext,
            channel_id: u64,
            command: &str,
            args: &str,
        ) -> anyhow::Result<bool> {
            if command != "echo" {
                return Ok(false);
            }
            ctx.send(channel_id, args).await?;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_context_send_addresses_transport() {
        let bus = Arc::new(MessageBus::new(8));
        let ctx = BotContext::new(bus.clone(), Arc::new(LinkState::new()), "discord");

        ctx.send(42, "hello").await.unwrap();

        let msg = bus.consume_outbound().await.unwrap();
        assert_eq!(msg, OutboundMessage::new("discord", 42, "hello"));
    }

    #[tokio::test]
    async fn test_default_on_ready_is_noop() {
        let bus = Arc::new(MessageBus::new(8));
        let ctx = BotContext::new(bus.clone(), Arc::new(LinkState::new()), "discord");
        let module = EchoModule;

        module.on_ready(&ctx, 1).await;
        assert!(bus.try_consume_outbound().await.is_none());

        assert!(module.handle_command(&ctx, 1, "echo", "hi").await.unwrap());
        assert!(!module.handle_command(&ctx, 1, "other", "").await.unwrap());
        assert_eq!(bus.consume_outbound().await.unwrap().content, "hi");
    }

    #[test]
    fn test_context_is_closed_follows_link() {
        let link = Arc::new(LinkState::new());
        let ctx = BotContext::new(Arc::new(MessageBus::new(1)), link.clone(), "discord");
        assert!(!ctx.is_closed());
        link.mark_closed();
        assert!(ctx.is_closed());
        assert_eq!(ctx.transport(), "discord");
    }
}
