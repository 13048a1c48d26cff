//! Per-channel Markov text generation library for chat bots.
//!
//! This crate provides an online word-level Markov chain system including:
//! - Incremental learning of one first-order model per channel
//! - Command-prefix filtering of the training stream
//! - Bounded stochastic generation with deterministic termination
//! - Persistent storage with per-channel atomic updates
//!
//! The chat transport, permissions and command parsing are left to the host.

use std::fmt;

/// Administrative operations: clearing channels and guild settings.
pub mod admin;

/// Per-guild configuration and engine-level inputs.
pub mod config;

/// High-level façade used by transports.
pub mod engine;

/// Error kinds and the crate-wide `Result`.
pub mod error;

/// Command prefix filter applied before learning.
pub mod filter;

/// Message ingestion and bulk import.
pub mod ingestor;

/// Word-level Markov models and generation logic.
pub mod model;

/// Model Store and its persistence backends.
pub mod store;

pub use config::{EngineConfig, GuildConfig};
pub use engine::MarkovEngine;
pub use error::{MarkovError, Result};

pub type GuildId = u64;
pub type ChannelId = u64;
pub type UserId = u64;

/// Identifies one channel model: channels are always scoped under a guild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
	pub guild: GuildId,
	pub channel: ChannelId,
}

impl ChannelKey {
	pub fn new(guild: GuildId, channel: ChannelId) -> Self {
		Self { guild, channel }
	}
}

impl fmt::Display for ChannelKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.guild, self.channel)
	}
}
