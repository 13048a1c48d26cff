use std::sync::Arc;

use rand::Rng;

use crate::admin;
use crate::config::EngineConfig;
use crate::error::{MarkovError, Result};
use crate::ingestor::{self, Ingestion, Record};
use crate::model::channel_model::ChannelModel;
use crate::model::generator::{Generator, StartSeed};
use crate::store::{Backend, ModelStore};
use crate::{ChannelId, ChannelKey, GuildId};

/// Single entry point of the Markov subsystem for a chat transport.
///
/// Wires the prefix filter, the ingestor, the generator and the admin surface
/// to one `ModelStore`. All methods take `&self`; share it behind an `Arc`.
pub struct MarkovEngine<B> {
	store: ModelStore<B>,
	config: EngineConfig,
}

impl<B: Backend> MarkovEngine<B> {
	pub fn new(backend: B, config: EngineConfig) -> Self {
		Self { store: ModelStore::new(backend), config }
	}

	pub fn store(&self) -> &ModelStore<B> {
		&self.store
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Learns one message. See [`ingestor::ingest`].
	pub fn ingest(&self, record: &Record<'_>) -> Result<Ingestion> {
		ingestor::ingest(&self.store, self.config.bot_id, record)
	}

	/// Learns a batch of historical messages. See [`ingestor::import_lines`].
	pub fn import_lines(&self, key: ChannelKey, lines: &[String]) -> Result<usize> {
		ingestor::import_lines(&self.store, key, lines)
	}

	/// Generates text for a channel with the thread-local random source.
	pub fn generate(&self, key: ChannelKey, seed: Option<&str>, max_len: Option<usize>) -> Result<String> {
		self.generate_with(key, seed, max_len, &mut rand::rng())
	}

	/// Generates text for a channel.
	///
	/// # Parameters
	/// - `seed`: text to continue; only its last word takes part.
	/// - `max_len`: overrides the guild budget (a number of words).
	/// - `rng`: random source for every draw.
	///
	/// # Errors
	/// - `NoData` if the channel has no model
	/// - `StorageFailure` if the snapshot cannot be read
	pub fn generate_with<R: Rng + ?Sized>(
		&self,
		key: ChannelKey,
		seed: Option<&str>,
		max_len: Option<usize>,
		rng: &mut R,
	) -> Result<String> {
		let snapshot = self.snapshot(key)?;
		let max_len = match max_len {
			Some(max_len) => max_len,
			None => self.store.get_config(key.guild)?.max_len(),
		};

		Generator::new(&snapshot)
			.generate(StartSeed::from(seed), max_len, rng)
			.ok_or(MarkovError::NoData { guild: key.guild, channel: key.channel })
	}

	/// Point-in-time view of a channel model.
	///
	/// # Errors
	/// `NoData` if the channel has no model.
	pub fn snapshot(&self, key: ChannelKey) -> Result<Arc<ChannelModel>> {
		self.store
			.get(key)?
			.filter(|model| !model.is_empty())
			.ok_or(MarkovError::NoData { guild: key.guild, channel: key.channel })
	}

	/// Channels of a guild holding a model.
	pub fn channels(&self, guild: GuildId) -> Result<Vec<ChannelId>> {
		self.store.channels(guild)
	}

	pub fn clear_channel(&self, key: ChannelKey) -> Result<()> {
		admin::clear_channel(&self.store, key)
	}

	pub fn set_prefixes(&self, guild: GuildId, prefixes: Vec<String>) -> Result<()> {
		admin::set_prefixes(&self.store, guild, prefixes)
	}

	/// Current prefixes, seeded with the bot prefix when empty.
	pub fn prefixes(&self, guild: GuildId) -> Result<Vec<String>> {
		admin::get_prefixes(&self.store, guild, &self.config.default_prefix)
	}

	pub fn set_max_len(&self, guild: GuildId, max_len: usize) -> Result<()> {
		admin::set_max_len(&self.store, guild, max_len)
	}

	pub fn max_len(&self, guild: GuildId) -> Result<usize> {
		admin::get_max_len(&self.store, guild)
	}
}
