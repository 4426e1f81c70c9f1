//! Run command — wires config, transport, dispatcher and shutdown.
//!
//! Startup sequence:
//! 1. Resolve the bot token (fatal when missing)
//! 2. Load the router config (fatal on bad format or parse error)
//! 3. Build channel runtimes, or the fallback runtime
//! 4. Create message bus + link state, register the transport
//! 5. Run: `tokio::select!` of channel manager + dispatcher
//! 6. Handle Ctrl+C for graceful shutdown

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use tunnelbot_channels::ChannelManager;
use tunnelbot_core::bus::queue::MessageBus;
use tunnelbot_core::config::{load_router_config, resolve_token, ModuleDefaults, StartupOptions};
use tunnelbot_core::{LinkState, ServiceUrlRegistry};
use tunnelbot_router::{build_channel_runtimes, fallback_runtime, Dispatcher};

use crate::helpers;

/// Transport outbound messages are addressed to.
const TRANSPORT: &str = "discord";

/// Run the bot until the connection closes or Ctrl+C.
pub async fn run(startup: StartupOptions) -> Result<()> {
    println!();
    helpers::print_banner();
    println!();

    // 1. Token
    let token = resolve_token(&startup)?;

    // 2. Config
    let config_path = Path::new(&startup.config_file);
    let config = load_router_config(config_path)
        .with_context(|| format!("loading {}", helpers::display_path(config_path)))?;

    // 3. Runtimes
    let defaults = ModuleDefaults::layered(&config.bot, &startup);
    let registry = Arc::new(ServiceUrlRegistry::from_entries(&config.services));
    let mut runtimes = build_channel_runtimes(&config, defaults, &registry);
    if runtimes.is_empty() {
        runtimes.push(fallback_runtime(&config, &startup, defaults, &registry)?);
    }

    // 4. Bus, link, transport
    let bus = Arc::new(MessageBus::new(100));
    let link = Arc::new(LinkState::new());

    #[allow(unused_mut)]
    let mut channel_manager = ChannelManager::new(bus.clone());

    #[cfg(feature = "discord")]
    {
        use tunnelbot_channels::discord::DiscordChannel;
        let discord = DiscordChannel::new(token, bus.clone(), link.clone())?;
        channel_manager.register(Arc::new(discord));
    }
    #[cfg(not(feature = "discord"))]
    {
        drop(token);
        tracing::warn!("built without a chat transport");
    }

    println!("  Config:    {}", helpers::display_path(config_path));
    for runtime in &runtimes {
        println!(
            "  Channel:   {} → {}",
            runtime.channel_id,
            runtime.module_names().join(", ")
        );
    }
    println!(
        "  Poll:      every {}s | announce on startup: {}",
        defaults.poll_seconds, defaults.announce_on_startup
    );
    println!();
    println!("  Ctrl+C to stop");
    println!();

    info!(
        config = %config_path.display(),
        channels = runtimes.len(),
        services = registry.len(),
        "bot starting"
    );

    let dispatcher = Dispatcher::new(runtimes, bus.clone(), link.clone(), TRANSPORT);

    // 5. Run until the transport ends, the link closes, or Ctrl+C.
    tokio::select! {
        result = channel_manager.start_all() => {
            if let Err(e) = result {
                error!(error = %e, "channel manager error");
            }
        }
        _ = dispatcher.run() => {
            info!("dispatcher exited");
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
            channel_manager.stop_all().await;
        }
    }

    // Stops any watch loop still sleeping.
    link.mark_closed();

    println!("  Stopped. Goodbye!");
    Ok(())
}
