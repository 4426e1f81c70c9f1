//! Tunnelbot CLI — entry point.
//!
//! # Commands
//!
//! - `tunnelbot run [--logs]` — connect to chat and serve URL commands
//! - `tunnelbot status` — show config, channel runtimes and resolved URLs
//!
//! Startup options come from flags or environment variables; a `.env`
//! file in the working directory is loaded first when present.

mod gateway;
mod helpers;
mod status;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use tunnelbot_core::config::schema::{DEFAULT_CONFIG_FILE, DEFAULT_POLL_SECONDS, DEFAULT_SERVICES_FILE};
use tunnelbot_core::config::{parse_bool, parse_channel_id, StartupOptions};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Tunnelbot — announces and serves tunnel URLs in chat
#[derive(Parser)]
#[command(name = "tunnelbot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to chat and start serving URL commands
    Run {
        #[command(flatten)]
        startup: StartupArgs,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show config, channel runtimes and each service's current URL
    Status {
        #[command(flatten)]
        startup: StartupArgs,
    },
}

/// Startup parameters, read once.
#[derive(Args, Debug, Clone)]
struct StartupArgs {
    /// Bot token
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// File holding the bot token
    #[arg(long, env = "TOKEN_FILE")]
    token_file: Option<String>,

    /// Channel used when the config binds none; ignored unless numeric
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    channel_id: Option<String>,

    /// Router config file (.json, .ini or .xml)
    #[arg(long, env = "DISCORD_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Legacy services-only file
    #[arg(long, env = "DISCORD_SERVICES_FILE", default_value = DEFAULT_SERVICES_FILE)]
    services_file: String,

    /// Announce every service's URL after login (1/true/yes/on)
    #[arg(
        long,
        env = "DISCORD_ANNOUNCE_ON_STARTUP",
        default_value = "1",
        action = clap::ArgAction::Set,
        value_parser = parse_flag
    )]
    announce_on_startup: bool,

    /// URL poll interval in seconds (minimum 5)
    #[arg(long, env = "DISCORD_URL_POLL_SECONDS", default_value_t = DEFAULT_POLL_SECONDS)]
    poll_seconds: u64,
}

impl From<StartupArgs> for StartupOptions {
    fn from(args: StartupArgs) -> Self {
        StartupOptions {
            token: args.token,
            token_file: args.token_file,
            default_channel_id: args.channel_id.as_deref().and_then(default_channel_id),
            config_file: args.config_file.trim().to_string(),
            services_file: args.services_file.trim().to_string(),
            announce_on_startup: args.announce_on_startup,
            poll_seconds: args.poll_seconds,
        }
    }
}

/// Keep a usable channel id; anything else leaves the fallback unset.
fn default_channel_id(raw: &str) -> Option<u64> {
    let id = parse_channel_id(raw);
    if id.is_none() && !raw.trim().is_empty() {
        warn!(value = %raw, "ignoring non-numeric DISCORD_CHANNEL_ID");
    }
    id
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(parse_bool(raw))
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { startup, logs } => {
            init_logging(logs);
            gateway::run(startup.into()).await
        }
        Commands::Status { startup } => status::run(&startup.into()),
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("tunnelbot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_map_to_startup_options() {
        let cli = Cli::try_parse_from([
            "tunnelbot",
            "run",
            "--token",
            "abc",
            "--channel-id",
            "42",
            "--config-file",
            "bot.ini",
            "--announce-on-startup",
            "off",
            "--poll-seconds",
            "2",
        ])
        .unwrap();

        let Commands::Run { startup, logs } = cli.command else {
            panic!("expected run");
        };
        assert!(!logs);

        let opts = StartupOptions::from(startup);
        assert_eq!(opts.token.as_deref(), Some("abc"));
        assert_eq!(opts.default_channel_id, Some(42));
        assert_eq!(opts.config_file, "bot.ini");
        assert!(!opts.announce_on_startup);
        assert_eq!(opts.poll_seconds, 2);
    }

    #[test]
    fn test_zero_channel_id_is_unset() {
        let cli = Cli::try_parse_from(["tunnelbot", "status", "--channel-id", "0"]).unwrap();
        let Commands::Status { startup } = cli.command else {
            panic!("expected status");
        };
        assert_eq!(StartupOptions::from(startup).default_channel_id, None);
    }

    #[test]
    fn test_garbage_channel_id_is_unset() {
        let cli = Cli::try_parse_from([
            "tunnelbot",
            "status",
            "--channel-id",
            "not-a-number",
            "--config-file",
            "cfg/c.json",
        ])
        .unwrap();
        let Commands::Status { startup } = cli.command else {
            panic!("expected status");
        };

        let opts = StartupOptions::from(startup);
        assert_eq!(opts.default_channel_id, None);
        assert_eq!(opts.config_file, "cfg/c.json");
    }

    #[test]
    fn test_default_channel_id() {
        assert_eq!(default_channel_id(" 876543210987654321 "), Some(876543210987654321));
        assert_eq!(default_channel_id("-5"), None);
        assert_eq!(default_channel_id(""), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Ok(true));
        assert_eq!(parse_flag("Yes"), Ok(true));
        assert_eq!(parse_flag("0"), Ok(false));
    }
}
