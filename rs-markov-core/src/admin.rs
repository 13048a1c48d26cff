use log::info;

use crate::config::GuildSetting;
use crate::error::Result;
use crate::store::{Backend, ModelStore};
use crate::{ChannelKey, GuildId};

/// Removes a channel model. Succeeds when the channel has none.
pub fn clear_channel<B: Backend>(store: &ModelStore<B>, key: ChannelKey) -> Result<()> {
	store.clear(key)?;
	info!("cleared model of {key}");
	Ok(())
}

/// Replaces the command prefix list of a guild. An empty list is legal.
pub fn set_prefixes<B: Backend>(store: &ModelStore<B>, guild: GuildId, prefixes: Vec<String>) -> Result<()> {
	let summary = format!("{prefixes:?}");
	store.set_config(guild, GuildSetting::Prefixes(prefixes))?;
	info!("guild {guild} prefixes set to {summary}");
	Ok(())
}

/// Returns the command prefixes of a guild.
///
/// An empty list is seeded with `default_prefix` and persisted before being returned.
pub fn get_prefixes<B: Backend>(store: &ModelStore<B>, guild: GuildId, default_prefix: &str) -> Result<Vec<String>> {
	let prefixes = store.get_config(guild)?.prefixes().to_vec();
	if !prefixes.is_empty() {
		return Ok(prefixes);
	}

	// Re-checked under the guild lock, a concurrent set_prefixes wins
	store.update_config(guild, |config| {
		if config.prefixes().is_empty() {
			info!("guild {guild} prefixes seeded with {default_prefix:?}");
			config.set_prefixes(vec![default_prefix.to_owned()]);
		}
		Ok(config.prefixes().to_vec())
	})
}

/// Sets the generation budget of a guild.
///
/// # Errors
/// `InvalidArgument` if `max_len < 1`.
pub fn set_max_len<B: Backend>(store: &ModelStore<B>, guild: GuildId, max_len: usize) -> Result<()> {
	store.set_config(guild, GuildSetting::MaxLen(max_len))?;
	info!("guild {guild} max_len set to {max_len}");
	Ok(())
}

pub fn get_max_len<B: Backend>(store: &ModelStore<B>, guild: GuildId) -> Result<usize> {
	Ok(store.get_config(guild)?.max_len())
}
