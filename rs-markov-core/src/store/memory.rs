use std::collections::HashMap;
use std::sync::Mutex;

use super::Backend;
use crate::config::GuildConfig;
use crate::error::StorageError;
use crate::model::channel_model::ChannelModel;
use crate::{ChannelId, ChannelKey, GuildId};

/// Keeps everything in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	models: Mutex<HashMap<ChannelKey, ChannelModel>>,
	configs: Mutex<HashMap<GuildId, GuildConfig>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Backend for MemoryBackend {
	fn load_model(&self, key: ChannelKey) -> Result<Option<ChannelModel>, StorageError> {
		Ok(self.models.lock()?.get(&key).cloned())
	}

	fn save_model(&self, key: ChannelKey, model: &ChannelModel) -> Result<(), StorageError> {
		self.models.lock()?.insert(key, model.clone());
		Ok(())
	}

	fn delete_model(&self, key: ChannelKey) -> Result<(), StorageError> {
		self.models.lock()?.remove(&key);
		Ok(())
	}

	fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelId>, StorageError> {
		Ok(self
			.models
			.lock()?
			.keys()
			.filter(|key| key.guild == guild)
			.map(|key| key.channel)
			.collect())
	}

	fn load_config(&self, guild: GuildId) -> Result<Option<GuildConfig>, StorageError> {
		Ok(self.configs.lock()?.get(&guild).cloned())
	}

	fn save_config(&self, guild: GuildId, config: &GuildConfig) -> Result<(), StorageError> {
		self.configs.lock()?.insert(guild, config.clone());
		Ok(())
	}
}
