//! Model Store: persistent channel models and guild configurations.
//!
//! The store is split in two layers:
//! - a `Backend`, the persistence substrate (files, memory, ...)
//! - the `ModelStore`, which adds per-key mutual exclusion and snapshot handoff
//!
//! Snapshots are `Arc<ChannelModel>` values. A mutation takes the cached model
//! out of the snapshot cache, applies the change (cloning only if a reader still
//! holds the snapshot), persists it, then publishes the new `Arc`. Readers never
//! observe a half-updated successor list.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};

use log::warn;

use crate::config::{GuildConfig, GuildSetting};
use crate::error::{Result, StorageError};
use crate::model::channel_model::ChannelModel;
use crate::{ChannelId, ChannelKey, GuildId};

/// Filesystem backend (postcard files, atomic replace).
pub mod file;

/// In-process backend.
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Persistence substrate contract.
///
/// # Requirements
/// - `save_*` are all-or-nothing: after a failure the previous value is intact
/// - `delete_model` on an absent key succeeds
pub trait Backend: Send + Sync {
	fn load_model(&self, key: ChannelKey) -> std::result::Result<Option<ChannelModel>, StorageError>;

	fn save_model(&self, key: ChannelKey, model: &ChannelModel) -> std::result::Result<(), StorageError>;

	fn delete_model(&self, key: ChannelKey) -> std::result::Result<(), StorageError>;

	/// Channels of `guild` that currently hold a model.
	fn list_channels(&self, guild: GuildId) -> std::result::Result<Vec<ChannelId>, StorageError>;

	fn load_config(&self, guild: GuildId) -> std::result::Result<Option<GuildConfig>, StorageError>;

	fn save_config(&self, guild: GuildId, config: &GuildConfig) -> std::result::Result<(), StorageError>;
}

type LockMap<K> = Mutex<HashMap<K, Arc<Mutex<()>>>>;

/// Concurrency layer over a `Backend`.
///
/// # Guarantees
/// - `mutate` and `clear` are linearizable per channel
/// - mutations of different channels proceed in parallel
/// - `get` reflects every `mutate` completed before it
/// - config updates are serialized per guild
pub struct ModelStore<B> {
	backend: B,
	snapshots: RwLock<HashMap<ChannelKey, Arc<ChannelModel>>>,
	channel_locks: LockMap<ChannelKey>,
	guild_locks: LockMap<GuildId>,
}

impl<B: Backend> ModelStore<B> {
	pub fn new(backend: B) -> Self {
		Self {
			backend,
			snapshots: RwLock::new(HashMap::new()),
			channel_locks: Mutex::new(HashMap::new()),
			guild_locks: Mutex::new(HashMap::new()),
		}
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Returns a point-in-time snapshot of a channel model.
	///
	/// Returns `None` when the channel has no model.
	pub fn get(&self, key: ChannelKey) -> Result<Option<Arc<ChannelModel>>> {
		if let Some(snapshot) = self.snapshots.read()?.get(&key) {
			return Ok(Some(Arc::clone(snapshot)));
		}

		// Cache miss: load under the channel lock so an in-flight mutate is not overwritten
		with_lock(&self.channel_locks, key, || {
			if let Some(snapshot) = self.snapshots.read()?.get(&key) {
				return Ok(Some(Arc::clone(snapshot)));
			}

			let loaded = self.backend.load_model(key).inspect_err(|e| warn!("failed to load model {key}: {e}"))?;
			match loaded {
				Some(model) if !model.is_empty() => {
					let snapshot = Arc::new(model);
					self.snapshots.write()?.insert(key, Arc::clone(&snapshot));
					Ok(Some(snapshot))
				}
				_ => Ok(None),
			}
		})
	}

	/// Read-modify-write of a channel model under the channel lock.
	///
	/// Loads the current model (empty if absent), applies `f`, and persists the
	/// result. If persisting fails nothing is published and the error is returned.
	/// An empty result removes the channel model instead of storing it.
	pub fn mutate<F, T>(&self, key: ChannelKey, f: F) -> Result<T>
	where
		F: FnOnce(&mut ChannelModel) -> T,
	{
		with_lock(&self.channel_locks, key, || {
			// Evicted until the new value is persisted; readers reload or wait on the lock
			let cached = self.snapshots.write()?.remove(&key);
			let existed;
			let mut snapshot = match cached {
				Some(snapshot) => {
					existed = true;
					snapshot
				}
				None => {
					let loaded = self.backend.load_model(key).inspect_err(|e| warn!("failed to load model {key}: {e}"))?;
					existed = loaded.is_some();
					Arc::new(loaded.unwrap_or_default())
				}
			};

			let model = Arc::make_mut(&mut snapshot);
			let output = f(model);

			if model.is_empty() {
				if existed {
					self.backend.delete_model(key).inspect_err(|e| warn!("failed to delete model {key}: {e}"))?;
				}
				return Ok(output);
			}

			self.backend.save_model(key, model).inspect_err(|e| warn!("failed to save model {key}: {e}"))?;
			self.snapshots.write()?.insert(key, snapshot);
			Ok(output)
		})
	}

	/// Deletes a channel model. Succeeds when the channel has no model.
	pub fn clear(&self, key: ChannelKey) -> Result<()> {
		with_lock(&self.channel_locks, key, || {
			self.backend.delete_model(key).inspect_err(|e| warn!("failed to delete model {key}: {e}"))?;
			self.snapshots.write()?.remove(&key);
			Ok(())
		})
	}

	/// Channels of a guild holding a model.
	pub fn channels(&self, guild: GuildId) -> Result<Vec<ChannelId>> {
		let mut channels = self.backend.list_channels(guild)?;
		channels.sort_unstable();
		Ok(channels)
	}

	/// Returns the guild configuration, or the defaults if it was never written.
	pub fn get_config(&self, guild: GuildId) -> Result<GuildConfig> {
		Ok(self.backend.load_config(guild)?.unwrap_or_default())
	}

	/// Read-modify-write of a guild configuration under the guild lock.
	///
	/// Nothing is persisted when `f` fails.
	pub fn update_config<F, T>(&self, guild: GuildId, f: F) -> Result<T>
	where
		F: FnOnce(&mut GuildConfig) -> Result<T>,
	{
		with_lock(&self.guild_locks, guild, || {
			let mut config = self.get_config(guild)?;
			let output = f(&mut config)?;
			self.backend.save_config(guild, &config).inspect_err(|e| warn!("failed to save config of guild {guild}: {e}"))?;
			Ok(output)
		})
	}

	/// Atomically sets one configuration field.
	pub fn set_config(&self, guild: GuildId, setting: GuildSetting) -> Result<()> {
		self.update_config(guild, |config| config.apply(setting))
	}
}

/// Runs `f` while holding the lock of `key`.
///
/// Locks only live in the map while someone holds or waits on them, so
/// lookups of channels that never get a model leave nothing behind.
fn with_lock<K, T, F>(locks: &LockMap<K>, key: K, f: F) -> Result<T>
where
	K: Eq + Hash + Copy,
	F: FnOnce() -> Result<T>,
{
	let lock = Arc::clone(locks.lock()?.entry(key).or_default());
	let output = match lock.lock() {
		Ok(_guard) => f(),
		Err(e) => Err(e.into()),
	};

	// Clones are only taken under the map mutex: a count of 2 means nobody else holds it
	let mut locks = locks.lock()?;
	if locks.get(&key).is_some_and(|entry| Arc::strong_count(entry) == 2) {
		locks.remove(&key);
	}
	output
}
