//! Dispatcher — routes inbound chat commands to channel runtimes.
//!
//! Lifecycle:
//! 1. Wait for the link to become ready
//! 2. Spawn `on_ready` for every (channel, module) pair
//! 3. Consume inbound messages one at a time until the queue or the link closes

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use tunnelbot_core::bus::queue::MessageBus;
use tunnelbot_core::bus::types::InboundMessage;
use tunnelbot_core::link::LinkState;

use crate::module::BotContext;
use crate::runtime::ChannelRuntime;

/// Command prefix marker.
pub const COMMAND_PREFIX: char = '!';

/// Split `!command args` into a lowercase command and trimmed args.
///
/// `None` when the text is not a command or the command is empty.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let body = text.trim().strip_prefix(COMMAND_PREFIX)?.trim();
    if body.is_empty() {
        return None;
    }

    let (command, args) = match body.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (body, ""),
    };
    Some((command.to_lowercase(), args.to_string()))
}

// ─────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────

pub struct Dispatcher {
    runtimes: HashMap<u64, ChannelRuntime>,
    bus: Arc<MessageBus>,
    link: Arc<LinkState>,
    ctx: BotContext,
}

impl Dispatcher {
    /// Create a dispatcher. A repeated channel id keeps the last runtime.
    pub fn new(
        runtimes: Vec<ChannelRuntime>,
        bus: Arc<MessageBus>,
        link: Arc<LinkState>,
        transport: &str,
    ) -> Self {
        let ctx = BotContext::new(bus.clone(), link.clone(), transport);
        let runtimes = runtimes
            .into_iter()
            .map(|runtime| (runtime.channel_id, runtime))
            .collect();
        Self {
            runtimes,
            bus,
            link,
            ctx,
        }
    }

    pub fn runtimes(&self) -> impl Iterator<Item = &ChannelRuntime> {
        self.runtimes.values()
    }

    /// Run until the inbound queue or the link closes.
    pub async fn run(&self) {
        let Some(self_id) = self.link.wait_until_ready().await else {
            info!("link closed before ready, dispatcher exiting");
            return;
        };
        info!(
            self_id = %self_id,
            channels = self.runtimes.len(),
            "dispatcher ready"
        );

        self.start_modules();

        loop {
            tokio::select! {
                msg = self.bus.consume_inbound() => {
                    let Some(msg) = msg else {
                        info!("inbound bus closed, dispatcher exiting");
                        break;
                    };
                    self.handle_message(&msg).await;
                }
                _ = self.link.closed() => {
                    info!("link closed, dispatcher exiting");
                    break;
                }
            }
        }
    }

    /// Spawn every module's `on_ready` so slow startup announcements never
    /// hold up command handling.
    fn start_modules(&self) {
        for runtime in self.runtimes.values() {
            for module in &runtime.modules {
                let module = module.clone();
                let ctx = self.ctx.clone();
                let channel_id = runtime.channel_id;
                tokio::spawn(async move {
                    debug!(channel_id = channel_id, module = module.name(), "module on_ready");
                    module.on_ready(&ctx, channel_id).await;
                });
            }
        }
    }

    /// Route one inbound message.
    ///
    /// Returns whether a module handled it.
    pub async fn handle_message(&self, msg: &InboundMessage) -> bool {
        if msg.from_self || self.link.self_id().as_deref() == Some(msg.author_id.as_str()) {
            return false;
        }

        let Some(runtime) = self.runtimes.get(&msg.channel_id) else {
            return false;
        };

        let Some((command, args)) = parse_command(&msg.content) else {
            return false;
        };

        debug!(
            channel_id = msg.channel_id,
            author = %msg.author_id,
            command = %command,
            "dispatching command"
        );

        for module in &runtime.modules {
            match module
                .handle_command(&self.ctx, msg.channel_id, &command, &args)
                .await
            {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        channel_id = msg.channel_id,
                        module = module.name(),
                        command = %command,
                        error = %e,
                        "module failed to handle command"
                    );
                    return true;
                }
            }
        }

        debug!(channel_id = msg.channel_id, command = %command, "no module handled command");
        false
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
