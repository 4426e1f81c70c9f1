//! Public URL resolver — reads a service's current externally reachable URL.
//!
//! Two sources, in order:
//! 1. a direct file holding nothing but the URL
//! 2. a tunnel log, scraped for the first `https://<name>.trycloudflare.com`
//!
//! Every read failure counts as "no URL yet". The resolver is re-run on each
//! poll and keeps no state between calls.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Quick-tunnel hostname pattern as printed by `cloudflared`.
static QUICK_TUNNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https://[a-z0-9-]+\.trycloudflare\.com").expect("valid quick tunnel regex")
});

/// Resolves one service's public URL from its source files.
#[derive(Clone, Debug)]
pub struct PublicUrlResolver {
    url_file: PathBuf,
    tunnel_log_file: PathBuf,
}

impl PublicUrlResolver {
    pub fn new(url_file: impl Into<PathBuf>, tunnel_log_file: impl Into<PathBuf>) -> Self {
        Self {
            url_file: url_file.into(),
            tunnel_log_file: tunnel_log_file.into(),
        }
    }

    /// Current best-known URL, or `None` when neither source yields one.
    pub fn resolve(&self) -> Option<String> {
        self.read_url_file().or_else(|| self.read_from_log())
    }

    /// First quick-tunnel URL in `text`.
    pub fn extract_from_text(text: &str) -> Option<String> {
        QUICK_TUNNEL_RE.find(text).map(|m| m.as_str().to_string())
    }

    fn read_url_file(&self) -> Option<String> {
        let content = read_source(&self.url_file)?;
        let url = content.trim();
        if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        }
    }

    fn read_from_log(&self) -> Option<String> {
        let content = read_source(&self.tunnel_log_file)?;
        Self::extract_from_text(&content)
    }
}

/// Read a source file, treating any failure as absent.
fn read_source(path: &Path) -> Option<String> {
    if path.as_os_str().is_empty() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "url source not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_direct_file_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let url_file = write(&dir, "url.txt", b"https://foo.example.com\n");
        let resolver = PublicUrlResolver::new(url_file, dir.path().join("missing.log"));
        assert_eq!(resolver.resolve().as_deref(), Some("https://foo.example.com"));
    }

    #[test]
    fn test_direct_file_wins_over_log() {
        let dir = TempDir::new().unwrap();
        let url_file = write(&dir, "url.txt", b"  https://direct.example.com  ");
        let log = write(&dir, "tunnel.log", b"https://from-log.trycloudflare.com");
        let resolver = PublicUrlResolver::new(url_file, log);
        assert_eq!(resolver.resolve().as_deref(), Some("https://direct.example.com"));
    }

    #[test]
    fn test_direct_file_content_is_not_validated() {
        let dir = TempDir::new().unwrap();
        let url_file = write(&dir, "url.txt", b"not really a url");
        let resolver = PublicUrlResolver::new(url_file, dir.path().join("missing.log"));
        assert_eq!(resolver.resolve().as_deref(), Some("not really a url"));
    }

    #[test]
    fn test_log_first_match_only() {
        let dir = TempDir::new().unwrap();
        let log = write(
            &dir,
            "tunnel.log",
            b"...starting tunnel at https://abcd-1234.trycloudflare.com ready\nhttps://other.trycloudflare.com",
        );
        let resolver = PublicUrlResolver::new(dir.path().join("missing.txt"), log);
        assert_eq!(
            resolver.resolve().as_deref(),
            Some("https://abcd-1234.trycloudflare.com")
        );
    }

    #[test]
    fn test_empty_direct_file_falls_back_to_log() {
        let dir = TempDir::new().unwrap();
        let url_file = write(&dir, "url.txt", b"   \n");
        let log = write(&dir, "tunnel.log", b"INF | https://quiet-lake.trycloudflare.com |");
        let resolver = PublicUrlResolver::new(url_file, log);
        assert_eq!(
            resolver.resolve().as_deref(),
            Some("https://quiet-lake.trycloudflare.com")
        );
    }

    #[test]
    fn test_log_without_match() {
        let dir = TempDir::new().unwrap();
        let log = write(&dir, "tunnel.log", b"Requesting new quick Tunnel on trycloudflare.com...");
        let resolver = PublicUrlResolver::new(dir.path().join("missing.txt"), log);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn test_nothing_available() {
        let resolver = PublicUrlResolver::new("/nonexistent/url.txt", "/nonexistent/tunnel.log");
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn test_undecodable_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = write(&dir, "tunnel.log", &[0xff, 0xfe, 0x00, 0x80]);
        let resolver = PublicUrlResolver::new(dir.path().join("missing.txt"), log);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn test_extract_is_case_insensitive() {
        let found = PublicUrlResolver::extract_from_text("url=HTTPS://Mixed-Case.TryCloudflare.com/path");
        assert_eq!(found.as_deref(), Some("HTTPS://Mixed-Case.TryCloudflare.com"));
    }

    #[test]
    fn test_extract_ignores_other_hosts() {
        assert!(PublicUrlResolver::extract_from_text("https://example.com https://trycloudflare.com").is_none());
    }
}
