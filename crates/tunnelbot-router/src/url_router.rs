//! URL router module — answers URL commands and announces URL changes.
//!
//! # Commands
//! - `!weburl` — list every service command
//! - `!weburl <key>` — current URL of the service with that key
//! - `!<command>` — current URL of the service with that command alias
//!
//! # Background
//! On ready, optionally announces every service's URL (waiting a bounded
//! time for missing ones), then starts one watch loop that re-resolves all
//! services every poll interval and announces values that changed.
//!
//! `last_urls` is shared by command replies and the watch loop. Each
//! compare-and-update happens under the lock; a resolve racing with it can
//! at worst cause one redundant or one missed announcement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tunnelbot_core::config::{clamp_poll_seconds, ModuleDefaults};
use tunnelbot_core::registry::{ServiceTarget, ServiceUrlRegistry};

use crate::module::{BotContext, BotModule};

/// Config name of this module.
pub const URL_ROUTER_MODULE: &str = "url_router";

/// Service key → last URL announced or replied.
type LastUrls = Arc<Mutex<HashMap<String, String>>>;

/// How long the startup announcement waits for a missing URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnouncePolicy {
    /// Pause between attempts.
    pub step: Duration,
    /// Total wait per service before giving up.
    pub timeout: Duration,
}

impl Default for AnnouncePolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

const MIN_ANNOUNCE_STEP: Duration = Duration::from_millis(1);

// ─────────────────────────────────────────────
// UrlRouterModule
// ─────────────────────────────────────────────

pub struct UrlRouterModule {
    registry: Arc<ServiceUrlRegistry>,
    announce_on_startup: bool,
    poll_interval: Duration,
    announce_policy: AnnouncePolicy,
    last_urls: LastUrls,
    watch_started: AtomicBool,
}

impl UrlRouterModule {
    /// Create a module over `registry`. The poll interval never drops below 5 s.
    pub fn new(registry: Arc<ServiceUrlRegistry>, defaults: ModuleDefaults) -> Self {
        Self {
            registry,
            announce_on_startup: defaults.announce_on_startup,
            poll_interval: Duration::from_secs(clamp_poll_seconds(defaults.poll_seconds)),
            announce_policy: AnnouncePolicy::default(),
            last_urls: Arc::new(Mutex::new(HashMap::new())),
            watch_started: AtomicBool::new(false),
        }
    }

    /// Replace the startup wait policy. A zero step is raised to 1 ms.
    pub fn with_announce_policy(mut self, policy: AnnouncePolicy) -> Self {
        self.announce_policy = AnnouncePolicy {
            step: policy.step.max(MIN_ANNOUNCE_STEP),
            ..policy
        };
        self
    }

    pub fn registry(&self) -> &Arc<ServiceUrlRegistry> {
        &self.registry
    }

    pub fn announce_on_startup(&self) -> bool {
        self.announce_on_startup
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Last recorded URL for a service key.
    pub async fn last_url(&self, key: &str) -> Option<String> {
        self.last_urls.lock().await.get(key).cloned()
    }

    /// Reply with a service's current URL, recording it when found.
    async fn reply_service_url(
        &self,
        ctx: &BotContext,
        channel_id: u64,
        service: &ServiceTarget,
    ) -> anyhow::Result<()> {
        let Some(url) = self.registry.read_url(service) else {
            debug!(service = %service.key, "url requested but not available");
            return ctx
                .send(
                    channel_id,
                    format!("{} external URL not found yet, try again shortly.", service.label),
                )
                .await;
        };

        self.last_urls
            .lock()
            .await
            .insert(service.key.clone(), url.clone());
        ctx.send(channel_id, format!("{} address: {url}", service.label))
            .await
    }

    /// Announce every service's URL, waiting up to the policy timeout for each.
    async fn announce_current_urls(&self, ctx: &BotContext, channel_id: u64) -> anyhow::Result<()> {
        let AnnouncePolicy { step, timeout } = self.announce_policy;
        let step = step.max(MIN_ANNOUNCE_STEP);

        for service in self.registry.services() {
            let mut elapsed = Duration::ZERO;
            let mut url = self.registry.read_url(service);
            while url.is_none() && elapsed < timeout {
                if ctx.is_closed() {
                    return Ok(());
                }
                tokio::time::sleep(step).await;
                elapsed += step;
                url = self.registry.read_url(service);
            }

            match url {
                Some(url) => {
                    info!(service = %service.key, url = %url, "startup url ready");
                    ctx.send(
                        channel_id,
                        format!("{} external URL ready: {url}", service.label),
                    )
                    .await?;
                    self.last_urls.lock().await.insert(service.key.clone(), url);
                }
                None => {
                    warn!(
                        service = %service.key,
                        waited_s = elapsed.as_secs(),
                        "startup url not found"
                    );
                    ctx.send(
                        channel_id,
                        format!(
                            "{} external URL not found yet. Check with `!{}` or `!weburl {}`.",
                            service.label, service.command, service.key
                        ),
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BotModule for UrlRouterModule {
    fn name(&self) -> &str {
        URL_ROUTER_MODULE
    }

    async fn on_ready(&self, ctx: &BotContext, channel_id: u64) {
        if self.announce_on_startup {
            if let Err(e) = self.announce_current_urls(ctx, channel_id).await {
                warn!(channel_id = channel_id, error = %e, "startup announcement failed");
            }
        }

        if self.watch_started.swap(true, Ordering::SeqCst) {
            debug!(channel_id = channel_id, "url watch already running");
            return;
        }

        tokio::spawn(watch_url_changes(
            self.registry.clone(),
            self.last_urls.clone(),
            ctx.clone(),
            channel_id,
            self.poll_interval,
        ));
    }

    async fn handle_command(
        &self,
        ctx: &BotContext,
        channel_id: u64,
        command: &str,
        args: &str,
    ) -> anyhow::Result<bool> {
        if self.registry.is_empty() {
            ctx.send(channel_id, "Service configuration is empty.").await?;
            return Ok(true);
        }

        if command == "weburl" {
            let key = args.trim().to_lowercase();
            if key.is_empty() {
                let listing = self
                    .registry
                    .services()
                    .iter()
                    .map(|s| format!("`!{}`", s.command))
                    .collect::<Vec<_>>()
                    .join(", ");
                ctx.send(channel_id, format!("Available commands: {listing}"))
                    .await?;
                return Ok(true);
            }

            match self.registry.by_key(&key) {
                Some(service) => self.reply_service_url(ctx, channel_id, service).await?,
                None => {
                    ctx.send(channel_id, format!("Not a supported service: {key}"))
                        .await?
                }
            }
            return Ok(true);
        }

        let Some(service) = self.registry.by_command(command) else {
            return Ok(false);
        };
        self.reply_service_url(ctx, channel_id, service).await?;
        Ok(true)
    }
}

// ─────────────────────────────────────────────
// Watch loop
// ─────────────────────────────────────────────

/// Poll every service until the link closes, announcing changed URLs.
async fn watch_url_changes(
    registry: Arc<ServiceUrlRegistry>,
    last_urls: LastUrls,
    ctx: BotContext,
    channel_id: u64,
    interval: Duration,
) {
    info!(
        channel_id = channel_id,
        interval_s = interval.as_secs(),
        services = registry.len(),
        "url watch started"
    );

    loop {
        if ctx.is_closed() {
            break;
        }
        tokio::time::sleep(interval).await;
        if ctx.is_closed() {
            break;
        }
        check_for_changes(&registry, &last_urls, &ctx, channel_id).await;
    }

    info!(channel_id = channel_id, "url watch stopped");
}

/// One watch iteration. Returns how many updates were announced.
async fn check_for_changes(
    registry: &ServiceUrlRegistry,
    last_urls: &LastUrls,
    ctx: &BotContext,
    channel_id: u64,
) -> usize {
    let mut announced = 0;

    for service in registry.services() {
        let Some(url) = registry.read_url(service) else {
            continue;
        };

        if last_urls.lock().await.get(&service.key) == Some(&url) {
            continue;
        }

        info!(service = %service.key, url = %url, "public url changed");
        match ctx
            .send(channel_id, format!("{} external URL updated: {url}", service.label))
            .await
        {
            Ok(()) => {
                last_urls.lock().await.insert(service.key.clone(), url);
                announced += 1;
            }
            // Left unrecorded so the next poll retries.
            Err(e) => warn!(service = %service.key, error = %e, "failed to announce url update"),
        }
    }

    announced
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
