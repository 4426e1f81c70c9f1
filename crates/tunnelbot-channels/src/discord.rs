//! Discord transport — raw Gateway WebSocket + REST API.
//!
//! Uses the Discord Gateway (v10) for receiving messages and the REST API
//! for sending. No Discord library required.
//!
//! Features:
//! - HELLO → heartbeat with jitter and zombie-connection detection
//! - IDENTIFY, or RESUME when a session is known
//! - READY marks the shared `LinkState` ready with the bot's user id
//! - MESSAGE_CREATE → `InboundMessage` on the bus (`from_self` set for our own posts)
//! - Message chunking for >2000 char replies
//! - Rate-limit retry (HTTP 429)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use tunnelbot_core::bus::queue::MessageBus;
use tunnelbot_core::bus::types::{InboundMessage, OutboundMessage};
use tunnelbot_core::link::LinkState;

use crate::base::Channel;

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// Discord REST API base URL.
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Default Gateway WebSocket URL.
const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Discord message length limit.
const DISCORD_MAX_LEN: usize = 2000;

/// Delay before reconnecting after a dropped session.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// GUILDS(1) + GUILD_MESSAGES(512) + MESSAGE_CONTENT(32768).
const DEFAULT_INTENTS: u64 = 1 + 512 + 32768;

/// Close codes after which reconnecting cannot help
/// (bad token, invalid shard, sharding required, bad API version, bad intents).
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

// Gateway opcodes
const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RESUME: u64 = 6;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

/// How a single gateway session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// `stop()` was called.
    Shutdown,
    /// Recoverable; connect again.
    Reconnect,
    /// Unrecoverable close code.
    Fatal(String),
}

// ─────────────────────────────────────────────
// DiscordChannel
// ─────────────────────────────────────────────

/// Discord transport using raw Gateway WebSocket + REST API.
pub struct DiscordChannel {
    /// Bot token from the Discord Developer Portal.
    token: String,
    /// Message bus for inbound messages.
    bus: Arc<MessageBus>,
    /// Connection state shared with the dispatcher and watch loops.
    link: Arc<LinkState>,
    /// REST API base URL.
    api_base: String,
    /// Gateway WebSocket URL.
    gateway_url: String,
    /// Gateway intents bitmask.
    intents: u64,
    /// Shutdown signal.
    shutdown: Arc<Notify>,
    /// Set once `stop()` has been called.
    stopping: AtomicBool,
    /// HTTP client for REST API calls.
    http: reqwest::Client,
    /// Gateway sequence number for heartbeats.
    seq: Arc<Mutex<Option<u64>>>,
    /// Whether the last heartbeat was ACKed.
    heartbeat_acked: Arc<AtomicBool>,
    /// Session ID for resume.
    session_id: Mutex<Option<String>>,
    /// Resume gateway URL.
    resume_url: Mutex<Option<String>>,
}

impl DiscordChannel {
    /// Create a new Discord transport.
    pub fn new(token: String, bus: Arc<MessageBus>, link: Arc<LinkState>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            token,
            bus,
            link,
            api_base: DISCORD_API_BASE.into(),
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            intents: DEFAULT_INTENTS,
            shutdown: Arc::new(Notify::new()),
            stopping: AtomicBool::new(false),
            http,
            seq: Arc::new(Mutex::new(None)),
            heartbeat_acked: Arc::new(AtomicBool::new(true)),
            session_id: Mutex::new(None),
            resume_url: Mutex::new(None),
        })
    }

    /// Override the REST API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Run gateway sessions until stopped or a fatal close.
    async fn run_gateway(&self) -> anyhow::Result<()> {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return Ok(());
            }

            match self.gateway_session().await {
                Ok(SessionEnd::Shutdown) => {
                    info!("discord gateway session ended normally");
                    return Ok(());
                }
                Ok(SessionEnd::Fatal(reason)) => {
                    error!(reason = %reason, "discord gateway closed permanently");
                    return Err(anyhow::anyhow!("discord gateway closed: {reason}"));
                }
                Ok(SessionEnd::Reconnect) => {
                    info!("discord gateway session dropped, reconnecting in 5s");
                }
                Err(e) => {
                    warn!(error = %e, "discord gateway error, reconnecting in 5s");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = self.shutdown.notified() => {
                    info!("discord shutdown during reconnect wait");
                    return Ok(());
                }
            }
        }
    }

    /// Single Gateway WebSocket session.
    async fn gateway_session(&self) -> anyhow::Result<SessionEnd> {
        let url = self
            .resume_url
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| self.gateway_url.clone());

        debug!(url = %url, "connecting to discord gateway");
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .context("discord gateway connect failed")?;
        let (mut write, mut read) = ws_stream.split();

        // All writes (identify, heartbeats) go through one writer task.
        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(16);
        let writer = tokio::spawn(async move {
            while let Some(frame) = ws_rx.recv().await {
                if let Err(e) = write.send(WsMessage::text(frame)).await {
                    warn!(error = %e, "discord ws write error");
                    return;
                }
            }
            let _ = write.send(WsMessage::Close(None)).await;
        });

        let zombie = Arc::new(Notify::new());
        let mut heartbeat: Option<JoinHandle<()>> = None;

        let end = if self.stopping.load(Ordering::SeqCst) {
            SessionEnd::Shutdown
        } else {
            loop {
                tokio::select! {
                    msg = read.next() => {
                        let msg = match msg {
                            Some(Ok(m)) => m,
                            Some(Err(e)) => {
                                warn!(error = %e, "discord ws read error");
                                break SessionEnd::Reconnect;
                            }
                            None => {
                                debug!("discord ws stream ended");
                                break SessionEnd::Reconnect;
                            }
                        };

                        let text = match msg {
                            WsMessage::Text(t) => t.to_string(),
                            WsMessage::Close(frame) => break close_outcome(frame),
                            _ => continue,
                        };

                        let payload: Value = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(e) => {
                                warn!(error = %e, "discord ws invalid json");
                                continue;
                            }
                        };

                        if let Some(end) = self
                            .handle_payload(&payload, &ws_tx, &mut heartbeat, &zombie)
                            .await
                        {
                            break end;
                        }
                    }
                    _ = zombie.notified() => {
                        warn!("discord heartbeat not ACKed, reconnecting");
                        break SessionEnd::Reconnect;
                    }
                    _ = self.shutdown.notified() => {
                        info!("discord shutdown signal received");
                        break SessionEnd::Shutdown;
                    }
                }
            }
        };

        if let Some(handle) = heartbeat.take() {
            handle.abort();
        }
        drop(ws_tx);
        if tokio::time::timeout(Duration::from_secs(2), writer).await.is_err() {
            debug!("discord ws writer did not finish in time");
        }

        Ok(end)
    }

    /// React to one gateway payload. `Some` ends the session.
    async fn handle_payload(
        &self,
        payload: &Value,
        ws_tx: &mpsc::Sender<String>,
        heartbeat: &mut Option<JoinHandle<()>>,
        zombie: &Arc<Notify>,
    ) -> Option<SessionEnd> {
        if let Some(s) = payload["s"].as_u64() {
            *self.seq.lock().await = Some(s);
        }

        match payload["op"].as_u64().unwrap_or(u64::MAX) {
            OP_HELLO => {
                let interval = payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41250);
                debug!(interval_ms = interval, "discord HELLO received");

                if let Some(h) = heartbeat.take() {
                    h.abort();
                }
                *heartbeat = Some(self.spawn_heartbeat(interval, ws_tx.clone(), zombie.clone()));

                let login = self.login_frame().await;
                if ws_tx.send(login).await.is_err() {
                    return Some(SessionEnd::Reconnect);
                }
            }
            OP_DISPATCH => {
                let event = payload["t"].as_str().unwrap_or("");
                self.handle_dispatch(event, &payload["d"]).await;
            }
            OP_HEARTBEAT_ACK => {
                self.heartbeat_acked.store(true, Ordering::SeqCst);
            }
            OP_HEARTBEAT => {
                let s = *self.seq.lock().await;
                let _ = ws_tx.send(heartbeat_frame(s)).await;
            }
            OP_RECONNECT => {
                info!("discord server requested reconnect");
                return Some(SessionEnd::Reconnect);
            }
            OP_INVALID_SESSION => {
                let resumable = payload["d"].as_bool().unwrap_or(false);
                warn!(resumable = resumable, "discord invalid session");
                if !resumable {
                    *self.session_id.lock().await = None;
                    *self.resume_url.lock().await = None;
                }
                return Some(SessionEnd::Reconnect);
            }
            _ => {}
        }
        None
    }

    /// Heartbeat loop: first beat after a random jitter, then every `interval_ms`.
    fn spawn_heartbeat(
        &self,
        interval_ms: u64,
        ws_tx: mpsc::Sender<String>,
        zombie: Arc<Notify>,
    ) -> JoinHandle<()> {
        let seq = self.seq.clone();
        let acked = self.heartbeat_acked.clone();
        acked.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let jitter = interval_ms as f64 * rand_jitter();
            tokio::time::sleep(Duration::from_millis(jitter as u64)).await;

            loop {
                if !acked.swap(false, Ordering::SeqCst) {
                    zombie.notify_one();
                    break;
                }

                let s = *seq.lock().await;
                if ws_tx.send(heartbeat_frame(s)).await.is_err() {
                    break;
                }

                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
        })
    }

    /// IDENTIFY for a fresh session, RESUME when one is known.
    async fn login_frame(&self) -> String {
        let session = self.session_id.lock().await.clone();
        match session {
            Some(sid) => {
                let s = *self.seq.lock().await;
                json!({
                    "op": OP_RESUME,
                    "d": { "token": self.token, "session_id": sid, "seq": s }
                })
                .to_string()
            }
            None => json!({
                "op": OP_IDENTIFY,
                "d": {
                    "token": self.token,
                    "intents": self.intents,
                    "properties": { "os": "tunnelbot", "browser": "tunnelbot", "device": "tunnelbot" }
                }
            })
            .to_string(),
        }
    }

    async fn handle_dispatch(&self, event: &str, data: &Value) {
        match event {
            "READY" => {
                if let Some(sid) = data["session_id"].as_str() {
                    *self.session_id.lock().await = Some(sid.to_string());
                }
                if let Some(url) = data["resume_gateway_url"].as_str() {
                    *self.resume_url.lock().await = Some(format!("{url}/?v=10&encoding=json"));
                }
                let user = data["user"]["username"].as_str().unwrap_or("unknown");
                info!(user = user, "discord bot READY");
                if let Some(user_id) = data["user"]["id"].as_str() {
                    self.link.mark_ready(user_id);
                }
            }
            "RESUMED" => info!("discord session resumed"),
            "MESSAGE_CREATE" => self.handle_message_create(data).await,
            _ => debug!(event = event, "discord event (unhandled)"),
        }
    }

    /// Turn a MESSAGE_CREATE event into an `InboundMessage`.
    async fn handle_message_create(&self, data: &Value) {
        let Some(author_id) = data["author"]["id"].as_str() else {
            return;
        };
        let Some(channel_id) = data["channel_id"].as_str().and_then(|id| id.parse::<u64>().ok())
        else {
            return;
        };

        let from_self = self.link.self_id().as_deref() == Some(author_id);
        if !from_self && data["author"]["bot"].as_bool().unwrap_or(false) {
            debug!(author = author_id, "ignoring message from another bot");
            return;
        }

        let content = data["content"].as_str().unwrap_or("");
        debug!(
            author = author_id,
            channel_id = channel_id,
            content_len = content.len(),
            "discord inbound message"
        );

        let mut inbound = InboundMessage::new("discord", channel_id, author_id, content);
        if from_self {
            inbound = inbound.from_self();
        }

        if let Err(e) = self.bus.publish_inbound(inbound).await {
            error!(error = %e, "failed to publish discord message to bus");
        }
    }

    /// Send one chunk via the REST API with retry on rate-limit.
    async fn send_rest(&self, channel_id: u64, content: &str) -> anyhow::Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let body = json!({ "content": content });

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bot {}", self.token))
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                let body_text = resp.text().await.unwrap_or_default();
                let retry_after: f64 = serde_json::from_str::<Value>(&body_text)
                    .ok()
                    .and_then(|v| v["retry_after"].as_f64())
                    .unwrap_or(1.0);
                warn!(
                    retry_after_s = retry_after,
                    attempt = attempts,
                    "discord rate limited"
                );
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            if attempts >= 3 {
                let err_text = resp.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!(
                    "discord send failed after 3 attempts (HTTP {status}): {err_text}"
                ));
            }

            warn!(
                status = %status,
                attempt = attempts,
                "discord send error, retrying in 1s"
            );
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Decide what a server-sent close frame means for reconnecting.
fn close_outcome(frame: Option<CloseFrame>) -> SessionEnd {
    let Some(frame) = frame else {
        info!("discord ws closed by server");
        return SessionEnd::Reconnect;
    };
    let code = u16::from(frame.code);
    info!(code = code, reason = %frame.reason, "discord ws closed by server");
    if FATAL_CLOSE_CODES.contains(&code) {
        SessionEnd::Fatal(format!("close code {code}: {}", frame.reason))
    } else {
        SessionEnd::Reconnect
    }
}

fn heartbeat_frame(seq: Option<u64>) -> String {
    json!({ "op": OP_HEARTBEAT, "d": seq }).to_string()
}

/// Split a message into chunks of at most `max_len` bytes, preferring
/// newline boundaries and never cutting through a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let split_at = remaining[..limit]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}

/// Simple jitter: a fraction between 0.0 and 1.0 for the first heartbeat.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos as f64) / 1_000_000_000.0
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> anyhow::Result<()> {
        if self.token.is_empty() {
            self.link.mark_closed();
            return Err(anyhow::anyhow!("discord token is empty"));
        }

        info!("starting discord channel (gateway v10)");
        let result = self.run_gateway().await;
        self.link.mark_closed();
        result
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!("stopping discord channel");
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        let chunks = split_message(&msg.content, DISCORD_MAX_LEN);
        for chunk in &chunks {
            self.send_rest(msg.channel_id, chunk).await?;
        }

        debug!(channel_id = msg.channel_id, chunks = chunks.len(), "discord message sent");
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
