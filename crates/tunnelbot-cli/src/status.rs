//! `tunnelbot status` — show configuration and what each service resolves to.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use tunnelbot_core::config::credentials::token_candidates;
use tunnelbot_core::config::{load_router_config, resolve_token, ModuleDefaults, StartupOptions};
use tunnelbot_core::ServiceUrlRegistry;
use tunnelbot_router::{build_channel_runtimes, fallback_runtime};

use crate::helpers::{display_path, exists_marker};

/// Run the status command.
pub fn run(startup: &StartupOptions) -> Result<()> {
    let config_path = Path::new(&startup.config_file);
    let config = load_router_config(config_path)?;

    println!();
    println!("{}", "Tunnelbot Status".cyan().bold());
    println!();

    // Config
    println!(
        "  {:<12} {} {}",
        "Config:".bold(),
        display_path(config_path),
        exists_marker(config_path)
    );

    // Token
    let token_status = if resolve_token(startup).is_ok() {
        format!("{} (found)", "✓".green())
    } else {
        let searched: Vec<String> = token_candidates(startup.token_file.as_deref())
            .iter()
            .map(|p| display_path(p))
            .collect();
        format!("{} searched {}", "✗ missing,".red(), searched.join(", ").dimmed())
    };
    println!("  {:<12} {}", "Token:".bold(), token_status);

    // Defaults
    let defaults = ModuleDefaults::layered(&config.bot, startup);
    println!(
        "  {:<12} every {}s | announce on startup: {}",
        "Poll:".bold(),
        defaults.poll_seconds,
        defaults.announce_on_startup
    );

    // Channels
    let registry = Arc::new(ServiceUrlRegistry::from_entries(&config.services));
    let mut runtimes = build_channel_runtimes(&config, defaults, &registry);
    let mut fallback = false;
    if runtimes.is_empty() {
        if let Ok(runtime) = fallback_runtime(&config, startup, defaults, &registry) {
            runtimes.push(runtime);
            fallback = true;
        }
    }

    println!();
    println!("  {}", "Channels:".bold());
    if runtimes.is_empty() {
        println!("    {}", "· none configured (set DISCORD_CHANNEL_ID)".red());
    }
    for runtime in &runtimes {
        let note = if fallback { " (fallback)".dimmed().to_string() } else { String::new() };
        println!(
            "    {:<22} {}{}",
            runtime.channel_id,
            runtime.module_names().join(", "),
            note
        );
    }

    // Services
    println!();
    println!("  {}", "Services:".bold());
    let registry = if registry.is_empty() {
        Arc::new(tunnelbot_core::registry::load_service_registry(Path::new(
            &startup.services_file,
        )))
    } else {
        registry
    };
    if registry.is_empty() {
        println!("    {}", "· none configured".dimmed());
    }
    for service in registry.services() {
        let url = match registry.read_url(service) {
            Some(url) => url.green().to_string(),
            None => "· not found yet".dimmed().to_string(),
        };
        println!(
            "    {:<22} {}",
            format!("{} (!{})", service.label, service.command),
            url
        );
    }

    println!();
    Ok(())
}
