//! Link state — whether the chat connection is up, and who the bot is.
//!
//! A transport owns the writes (`mark_ready`, `mark_closed`); the dispatcher
//! and every watch loop only read. Built on a `tokio::sync::watch` channel so
//! readers can both poll (`is_closed`) and wait (`wait_until_ready`, `closed`).

use tokio::sync::watch;
use tracing::{debug, info};

/// Lifecycle of the chat connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not yet logged in.
    Connecting,
    /// Logged in; `self_id` is the bot's own user id.
    Ready { self_id: String },
    /// The connection was torn down. Terminal.
    Closed,
}

/// Shared connection state.
pub struct LinkState {
    tx: watch::Sender<LinkStatus>,
}

impl LinkState {
    /// Create a link in the `Connecting` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LinkStatus::Connecting);
        Self { tx }
    }

    /// Record a successful login. Ignored once the link is closed.
    pub fn mark_ready(&self, self_id: impl Into<String>) {
        let self_id = self_id.into();
        let changed = self.tx.send_if_modified(|status| {
            if *status == LinkStatus::Closed {
                return false;
            }
            *status = LinkStatus::Ready {
                self_id: self_id.clone(),
            };
            true
        });
        if changed {
            info!(self_id = %self_id, "link ready");
        }
    }

    /// Record that the connection has closed for good.
    pub fn mark_closed(&self) {
        let previous = self.tx.send_replace(LinkStatus::Closed);
        if previous != LinkStatus::Closed {
            info!("link closed");
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> LinkStatus {
        self.tx.borrow().clone()
    }

    /// Whether the connection has closed.
    pub fn is_closed(&self) -> bool {
        matches!(*self.tx.borrow(), LinkStatus::Closed)
    }

    /// The bot's own user id, once logged in.
    pub fn self_id(&self) -> Option<String> {
        match &*self.tx.borrow() {
            LinkStatus::Ready { self_id } => Some(self_id.clone()),
            _ => None,
        }
    }

    /// Wait until the link leaves `Connecting`.
    ///
    /// Returns the bot's user id when ready, `None` if the link closed first.
    pub async fn wait_until_ready(&self) -> Option<String> {
        let mut rx = self.tx.subscribe();
        let status = match rx
            .wait_for(|status| *status != LinkStatus::Connecting)
            .await
        {
            Ok(status) => status.clone(),
            Err(_) => return None,
        };
        debug!(status = ?status, "link left connecting state");
        match status {
            LinkStatus::Ready { self_id } => Some(self_id),
            _ => None,
        }
    }

    /// Wait until the link is closed.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|status| *status == LinkStatus::Closed).await;
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_new_link_is_connecting() {
        let link = LinkState::new();
        assert_eq!(link.status(), LinkStatus::Connecting);
        assert!(!link.is_closed());
        assert!(link.self_id().is_none());
    }

    #[test]
    fn test_mark_ready_sets_self_id() {
        let link = LinkState::new();
        link.mark_ready("1234");
        assert_eq!(link.self_id().as_deref(), Some("1234"));
        assert!(!link.is_closed());
    }

    #[test]
    fn test_closed_is_terminal() {
        let link = LinkState::new();
        link.mark_closed();
        link.mark_ready("1234");
        assert!(link.is_closed());
        assert!(link.self_id().is_none());
    }

    #[tokio::test]
    async fn test_wait_until_ready_wakes_on_ready() {
        let link = Arc::new(LinkState::new());

        let waiter = link.clone();
        let handle = tokio::spawn(async move { waiter.wait_until_ready().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        link.mark_ready("bot-1");

        let result = handle.await.unwrap();
        assert_eq!(result.as_deref(), Some("bot-1"));
    }

    #[tokio::test]
    async fn test_closed_wakes_waiter() {
        let link = Arc::new(LinkState::new());
        link.mark_ready("bot-1");

        let waiter = link.clone();
        let handle = tokio::spawn(async move { waiter.closed().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        link.mark_closed();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_ready_returns_none_when_closed() {
        let link = LinkState::new();
        link.mark_closed();
        assert!(link.wait_until_ready().await.is_none());
    }
}
