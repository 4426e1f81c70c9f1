//! Shared CLI helpers — banner and path display.

use std::path::{Path, PathBuf};

use colored::Colorize;

/// Print the banner shown at startup.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "{}  v{}",
        "Tunnelbot".cyan().bold(),
        version.dimmed()
    );
}

/// Show `path` with the home directory collapsed to `~`.
pub fn display_path(path: &Path) -> String {
    match dirs_next::home_dir() {
        Some(home) => collapse_home(path, &home),
        None => path.display().to_string(),
    }
}

fn collapse_home(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => PathBuf::from("~").join(rest).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// A ✓ / (not found) marker for a path.
pub fn exists_marker(path: &Path) -> String {
    if path.exists() {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_home_nested() {
        let shown = collapse_home(Path::new("/home/bot/.tunnelbot/token.txt"), Path::new("/home/bot"));
        assert_eq!(shown, "~/.tunnelbot/token.txt");
    }

    #[test]
    fn collapse_home_bare() {
        assert_eq!(collapse_home(Path::new("/home/bot"), Path::new("/home/bot")), "~");
    }

    #[test]
    fn collapse_home_outside() {
        assert_eq!(collapse_home(Path::new("/etc/x"), Path::new("/home/bot")), "/etc/x");
    }

    #[test]
    fn display_relative_path_unchanged() {
        assert_eq!(display_path(Path::new("config/token.txt")), "config/token.txt");
    }
}
