//! Path helpers.

use std::path::{Path, PathBuf};

/// Per-user data directory, `~/.tunnelbot`.
pub fn get_data_path() -> PathBuf {
    home_or_cwd().join(".tunnelbot")
}

/// Replace a leading `~` with the home directory; other paths pass through.
pub fn expand_home(path: &str) -> PathBuf {
    expand_with(path, &home_or_cwd())
}

fn expand_with(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => home.to_path_buf(),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

fn home_or_cwd() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "/home/bot";

    #[test]
    fn test_expand_nested() {
        assert_eq!(
            expand_with("~/.tunnelbot/token.txt", Path::new(HOME)),
            PathBuf::from("/home/bot/.tunnelbot/token.txt")
        );
    }

    #[test]
    fn test_expand_bare_tilde() {
        assert_eq!(expand_with("~", Path::new(HOME)), PathBuf::from(HOME));
    }

    #[test]
    fn test_other_paths_untouched() {
        for path in ["config/token.txt", "/etc/token", "~other/token"] {
            assert_eq!(expand_with(path, Path::new(HOME)), PathBuf::from(path));
        }
    }

    #[test]
    fn test_data_path() {
        assert!(get_data_path().ends_with(".tunnelbot"));
        assert!(!expand_home("~/x").starts_with("~"));
    }
}
