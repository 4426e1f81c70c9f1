//! Bot token resolution.
//!
//! Search order:
//! 1. the token given directly (flag or `DISCORD_BOT_TOKEN`)
//! 2. the explicit token file (`TOKEN_FILE`)
//! 3. `config/token.txt`
//! 4. `~/.tunnelbot/token.txt`

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::ConfigError;
use super::schema::StartupOptions;

/// Token file looked up relative to the working directory.
pub const LOCAL_TOKEN_FILE: &str = "config/token.txt";

/// Resolve the bot token from startup options.
pub fn resolve_token(opts: &StartupOptions) -> Result<String, ConfigError> {
    let candidates = token_candidates(opts.token_file.as_deref());
    resolve_token_from(opts.token.as_deref(), &candidates)
}

/// Token files to try, in order.
pub fn token_candidates(token_file: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(file) = token_file.map(str::trim).filter(|f| !f.is_empty()) {
        candidates.push(crate::utils::expand_home(file));
    }
    candidates.push(PathBuf::from(LOCAL_TOKEN_FILE));
    candidates.push(crate::utils::get_data_path().join("token.txt"));
    candidates
}

fn resolve_token_from(direct: Option<&str>, candidates: &[PathBuf]) -> Result<String, ConfigError> {
    if let Some(token) = direct.map(str::trim).filter(|t| !t.is_empty()) {
        debug!("using bot token from environment");
        return Ok(token.to_string());
    }

    for path in candidates {
        if let Some(token) = read_token_file(path) {
            info!(path = %path.display(), "using bot token from file");
            return Ok(token);
        }
    }

    Err(ConfigError::MissingToken)
}

fn read_token_file(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "token file not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("token.txt");
        std::fs::write(&file, "from-file").unwrap();

        let token = resolve_token_from(Some("  direct  "), &[file]).unwrap();
        assert_eq!(token, "direct");
    }

    #[test]
    fn test_blank_direct_token_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("token.txt");
        std::fs::write(&file, "from-file\n").unwrap();

        let token = resolve_token_from(Some("   "), &[file]).unwrap();
        assert_eq!(token, "from-file");
    }

    #[test]
    fn test_first_non_empty_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let empty = dir.path().join("empty.txt");
        let good = dir.path().join("good.txt");
        std::fs::write(&empty, "  \n").unwrap();
        std::fs::write(&good, "secret").unwrap();

        let token = resolve_token_from(None, &[missing, empty, good]).unwrap();
        assert_eq!(token, "secret");
    }

    #[test]
    fn test_no_token_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_token_from(None, &[dir.path().join("none.txt")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn test_candidate_order() {
        let candidates = token_candidates(Some("/etc/tunnelbot/token"));
        assert_eq!(candidates[0], PathBuf::from("/etc/tunnelbot/token"));
        assert_eq!(candidates[1], PathBuf::from(LOCAL_TOKEN_FILE));
        assert!(candidates[2].ends_with(".tunnelbot/token.txt"));

        assert_eq!(token_candidates(Some("  ")).len(), 2);
        assert_eq!(token_candidates(None).len(), 2);
    }
}
