use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use crate::UserId;

/// Default generation budget for a guild that never configured one.
pub const DEFAULT_MAX_LEN: usize = 200;

/// Per-guild configuration of the Markov subsystem.
///
/// Created with defaults on first read and persisted by the store on the
/// first write. It lives as long as the guild.
///
/// # Invariants
/// - `max_len >= 1`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GuildConfig {
	/// Command prefixes; a message starting with any of them is never learned.
	prefixes: Vec<String>,

	/// Generation budget. Compared against the number of generated words.
	max_len: usize,
}

impl Default for GuildConfig {
	fn default() -> Self {
		Self { prefixes: Vec::new(), max_len: DEFAULT_MAX_LEN }
	}
}

/// A single configuration field update, applied atomically by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuildSetting {
	Prefixes(Vec<String>),
	MaxLen(usize),
}

impl GuildConfig {
	pub fn prefixes(&self) -> &[String] {
		&self.prefixes
	}

	pub fn max_len(&self) -> usize {
		self.max_len
	}

	/// Replaces the prefix list. An empty list is legal.
	pub fn set_prefixes(&mut self, prefixes: Vec<String>) {
		self.prefixes = prefixes;
	}

	/// Sets the generation budget.
	///
	/// # Errors
	/// Returns `InvalidArgument` if `max_len < 1`. No upper bound is enforced here.
	pub fn set_max_len(&mut self, max_len: usize) -> Result<()> {
		if max_len < 1 {
			return Err(MarkovError::invalid("max_len", max_len));
		}
		self.max_len = max_len;
		Ok(())
	}

	/// Applies one setting.
	pub fn apply(&mut self, setting: GuildSetting) -> Result<()> {
		match setting {
			GuildSetting::Prefixes(prefixes) => {
				self.set_prefixes(prefixes);
				Ok(())
			}
			GuildSetting::MaxLen(max_len) => self.set_max_len(max_len),
		}
	}
}

/// Process-wide inputs the host bot supplies to the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
	/// The bot's own identity; its messages are never learned.
	pub bot_id: UserId,

	/// The bot's command prefix, used to seed an empty prefix list.
	pub default_prefix: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self { bot_id: 0, default_prefix: "!".to_owned() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = GuildConfig::default();
		assert!(config.prefixes().is_empty());
		assert_eq!(config.max_len(), 200);
	}

	#[test]
	fn test_max_len_rejects_zero() {
		let mut config = GuildConfig::default();
		let err = config.set_max_len(0).unwrap_err();
		assert!(matches!(err, MarkovError::InvalidArgument { field: "max_len", ref value } if value == "0"));
		assert_eq!(config.max_len(), DEFAULT_MAX_LEN);
	}

	#[test]
	fn test_apply_settings() {
		let mut config = GuildConfig::default();
		config.apply(GuildSetting::MaxLen(3000)).unwrap();
		config.apply(GuildSetting::Prefixes(vec!["?".to_owned(), "!".to_owned()])).unwrap();
		assert_eq!(config.max_len(), 3000);
		assert_eq!(config.prefixes(), ["?", "!"]);

		config.apply(GuildSetting::Prefixes(Vec::new())).unwrap();
		assert!(config.prefixes().is_empty());
	}
}
