//! Tunnelbot Channels — chat transport integrations.
//!
//! This crate provides:
//! - **base**: The `Channel` trait every transport implements
//! - **manager**: `ChannelManager` — lifecycle orchestration and outbound message routing
//!
//! Concrete transports are feature-gated modules (`discord`).

pub mod base;
pub mod manager;

#[cfg(feature = "discord")]
pub mod discord;

pub use base::Channel;
pub use manager::ChannelManager;
