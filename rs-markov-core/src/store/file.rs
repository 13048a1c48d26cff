use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use super::Backend;
use crate::config::GuildConfig;
use crate::error::StorageError;
use crate::model::channel_model::ChannelModel;
use crate::{ChannelId, ChannelKey, GuildId};

const EXTENSION: &str = "bin";
const CONFIG_FILE: &str = "config.bin";
const MODELS_DIR: &str = "models";

/// Stores postcard-encoded files under a data directory.
///
/// Layout:
/// - `<root>/<guild>/config.bin`
/// - `<root>/<guild>/models/<channel>.bin`
///
/// Every write goes to a temporary file in the destination directory which is
/// then renamed over the target, so a failed write leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct FileBackend {
	root: PathBuf,
}

impl FileBackend {
	/// Opens (and creates if needed) a data directory.
	///
	/// - `"."` or `"./"` resolves to the current working directory
	pub fn open<P: AsRef<Path>>(root: P) -> io::Result<Self> {
		let root = normalize_folder(root.as_ref());
		fs::create_dir_all(&root)?;
		Ok(Self { root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn guild_dir(&self, guild: GuildId) -> PathBuf {
		self.root.join(guild.to_string())
	}

	fn models_dir(&self, guild: GuildId) -> PathBuf {
		self.guild_dir(guild).join(MODELS_DIR)
	}

	fn model_path(&self, key: ChannelKey) -> PathBuf {
		let mut path = self.models_dir(key.guild).join(key.channel.to_string());
		path.set_extension(EXTENSION);
		path
	}

	fn config_path(&self, guild: GuildId) -> PathBuf {
		self.guild_dir(guild).join(CONFIG_FILE)
	}
}

impl Backend for FileBackend {
	fn load_model(&self, key: ChannelKey) -> Result<Option<ChannelModel>, StorageError> {
		read_value(&self.model_path(key))
	}

	fn save_model(&self, key: ChannelKey, model: &ChannelModel) -> Result<(), StorageError> {
		write_value(&self.model_path(key), model)
	}

	fn delete_model(&self, key: ChannelKey) -> Result<(), StorageError> {
		match fs::remove_file(self.model_path(key)) {
			Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
			_ => Ok(()),
		}
	}

	fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelId>, StorageError> {
		let dir = self.models_dir(guild);
		if !dir.is_dir() {
			return Ok(Vec::new());
		}

		let mut channels = Vec::new();
		for entry in fs::read_dir(dir)? {
			let path = entry?.path();
			if !path.is_file() || path.extension() != Some(std::ffi::OsStr::new(EXTENSION)) {
				continue;
			}
			// Leftover temporary files and foreign names are skipped
			if let Some(channel) = path.file_stem().and_then(|stem| stem.to_str()).and_then(|stem| stem.parse().ok()) {
				channels.push(channel);
			}
		}

		Ok(channels)
	}

	fn load_config(&self, guild: GuildId) -> Result<Option<GuildConfig>, StorageError> {
		read_value(&self.config_path(guild))
	}

	fn save_config(&self, guild: GuildId, config: &GuildConfig) -> Result<(), StorageError> {
		write_value(&self.config_path(guild), config)
	}
}

/// Reads and decodes a file. A missing file is `None`.
fn read_value<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e.into()),
	};
	Ok(Some(postcard::from_bytes(&bytes)?))
}

/// Encodes a value and atomically replaces `path` with it.
fn write_value<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
	let parent = path.parent().unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(parent)?;

	let bytes = postcard::to_stdvec(value)?;
	let mut temp_file = NamedTempFile::new_in(parent)?;
	temp_file.write_all(&bytes)?;
	temp_file.as_file().sync_all()?;
	temp_file.persist(path)?;
	Ok(())
}

fn normalize_folder(input: &Path) -> PathBuf {
	if input == Path::new(".") || input == Path::new("./") {
		std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		input.to_path_buf()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::ModelStore;

	const KEY: ChannelKey = ChannelKey { guild: 7, channel: 70 };

	#[test]
	fn test_missing_files_read_as_none() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::open(dir.path()).unwrap();
		assert!(backend.load_model(KEY).unwrap().is_none());
		assert!(backend.load_config(7).unwrap().is_none());
		assert!(backend.list_channels(7).unwrap().is_empty());
		backend.delete_model(KEY).unwrap();
	}

	#[test]
	fn test_layout_on_disk() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::open(dir.path()).unwrap();
		let mut model = ChannelModel::new();
		model.add_message("on disk");
		backend.save_model(KEY, &model).unwrap();
		backend.save_config(7, &GuildConfig::default()).unwrap();

		assert!(dir.path().join("7").join("models").join("70.bin").is_file());
		assert!(dir.path().join("7").join("config.bin").is_file());
		assert_eq!(backend.list_channels(7).unwrap(), vec![70]);
	}

	#[test]
	fn test_survives_restart() {
		let dir = tempfile::tempdir().unwrap();
		{
			let store = ModelStore::new(FileBackend::open(dir.path()).unwrap());
			store.mutate(KEY, |model| model.add_message("remember me")).unwrap();
			store.update_config(7, |config| config.set_max_len(12)).unwrap();
		}

		let store = ModelStore::new(FileBackend::open(dir.path()).unwrap());
		let snapshot = store.get(KEY).unwrap().unwrap();
		assert_eq!(snapshot.count("remember", "me"), 1);
		assert_eq!(store.get_config(7).unwrap().max_len(), 12);
	}

	#[test]
	fn test_delete_removes_file() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::open(dir.path()).unwrap();
		let mut model = ChannelModel::new();
		model.add_message("bye now");
		backend.save_model(KEY, &model).unwrap();
		backend.delete_model(KEY).unwrap();
		assert!(backend.load_model(KEY).unwrap().is_none());
		assert!(backend.list_channels(7).unwrap().is_empty());
	}

	#[test]
	fn test_corrupt_file_is_storage_failure() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::open(dir.path()).unwrap();
		let path = backend.model_path(KEY);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(&path, [0xff, 0xff, 0xff]).unwrap();
		assert!(matches!(backend.load_model(KEY), Err(StorageError::Encoding(_))));
	}
}
