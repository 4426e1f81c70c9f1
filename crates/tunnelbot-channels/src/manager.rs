//! Channel Manager — runs transports and delivers outbound messages.
//!
//! Every registered transport's `start()` runs on a `JoinSet`. One extra
//! task drains the outbound queue and hands each message to the transport
//! named in `OutboundMessage.channel`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tunnelbot_core::bus::queue::MessageBus;
use tunnelbot_core::bus::types::OutboundMessage;

use crate::base::Channel;

type Transports = HashMap<String, Arc<dyn Channel>>;

pub struct ChannelManager {
    transports: Transports,
    bus: Arc<MessageBus>,
    shutdown: Arc<Notify>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            transports: HashMap::new(),
            bus,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Add a transport; a later one with the same name replaces it.
    pub fn register(&mut self, transport: Arc<dyn Channel>) {
        let name = transport.name().to_string();
        if self.transports.insert(name.clone(), transport).is_some() {
            warn!(transport = %name, "transport registered twice, keeping last");
        } else {
            info!(transport = %name, "transport registered");
        }
    }

    /// Registered transport names, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transports.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Run every transport plus outbound delivery.
    ///
    /// Returns after `stop_all()`, or once every transport's `start()`
    /// has returned on its own (e.g. a fatal gateway close).
    pub async fn start_all(&self) -> Result<()> {
        if self.transports.is_empty() {
            warn!("no transports registered, nothing to start");
            return Ok(());
        }
        info!(transports = ?self.channel_names(), "starting transports");

        let mut running = JoinSet::new();
        for transport in self.transports.values() {
            let transport = transport.clone();
            running.spawn(async move {
                let name = transport.name().to_string();
                match transport.start().await {
                    Ok(()) => info!(transport = %name, "transport finished"),
                    Err(e) => error!(transport = %name, error = %e, "transport failed"),
                }
            });
        }

        let delivery = tokio::spawn(deliver_outbound(
            self.bus.clone(),
            self.transports.clone(),
            self.shutdown.clone(),
        ));

        tokio::select! {
            _ = async { while running.join_next().await.is_some() {} } => {
                info!("every transport has finished");
            }
            _ = self.shutdown.notified() => {
                info!("channel manager stopping");
            }
        }

        delivery.abort();
        Ok(())
    }

    /// Signal shutdown, refuse new outbound messages and stop every transport.
    pub async fn stop_all(&self) {
        self.shutdown.notify_waiters();
        self.bus.close_outbound();

        for (name, transport) in &self.transports {
            debug!(transport = %name, "stopping transport");
            if let Err(e) = transport.stop().await {
                error!(transport = %name, error = %e, "transport stop failed");
            }
        }
    }
}

/// Drain the outbound queue until it closes or shutdown is signaled.
async fn deliver_outbound(bus: Arc<MessageBus>, transports: Transports, shutdown: Arc<Notify>) {
    loop {
        let msg = tokio::select! {
            msg = bus.consume_outbound() => msg,
            _ = shutdown.notified() => break,
        };
        let Some(msg) = msg else {
            debug!("outbound queue closed");
            break;
        };
        route(&transports, &msg).await;
    }
}

/// Hand one message to the transport it names. Failures are logged.
async fn route(transports: &Transports, msg: &OutboundMessage) {
    let Some(transport) = transports.get(&msg.channel) else {
        warn!(transport = %msg.channel, "outbound message for unknown transport dropped");
        return;
    };

    debug!(
        transport = %msg.channel,
        channel_id = msg.channel_id,
        content_len = msg.content.len(),
        "delivering outbound message"
    );
    if let Err(e) = transport.send(msg).await {
        error!(
            transport = %msg.channel,
            channel_id = msg.channel_id,
            error = %e,
            "outbound delivery failed"
        );
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
