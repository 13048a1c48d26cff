use std::sync::mpsc;
use std::thread;

use log::debug;

use crate::error::Result;
use crate::filter::is_command;
use crate::model::channel_model::ChannelModel;
use crate::store::{Backend, ModelStore};
use crate::{ChannelKey, UserId};

/// One message delivered by the chat transport.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
	pub key: ChannelKey,
	pub author: UserId,
	pub text: &'a str,
}

/// Why a record was not learned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
	EmptyText,
	OwnMessage,
	Command,
}

/// Outcome of a successful ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ingestion {
	/// The record was accepted; `pairs` adjacent pairs were learned (possibly 0).
	Learned { pairs: usize },
	Skipped(SkipReason),
}

/// Learns one message into its channel model.
///
/// # Behavior
/// - Empty texts, the bot's own messages and commands are skipped (not errors).
/// - Every adjacent word pair is appended in a single atomic `mutate`.
///
/// # Errors
/// Storage failures propagate; nothing of the message is persisted then.
pub fn ingest<B: Backend>(store: &ModelStore<B>, bot_id: UserId, record: &Record<'_>) -> Result<Ingestion> {
	if record.text.is_empty() {
		debug!("skip empty message in {}", record.key);
		return Ok(Ingestion::Skipped(SkipReason::EmptyText));
	}
	if record.author == bot_id {
		debug!("skip own message in {}", record.key);
		return Ok(Ingestion::Skipped(SkipReason::OwnMessage));
	}

	let config = store.get_config(record.key.guild)?;
	if is_command(record.text, config.prefixes()) {
		debug!("skip command in {}", record.key);
		return Ok(Ingestion::Skipped(SkipReason::Command));
	}

	let pairs = store.mutate(record.key, |model| model.add_message(record.text))?;
	Ok(Ingestion::Learned { pairs })
}

/// Learns a batch of historical messages (one per line) in one atomic `mutate`.
///
/// # Behavior
/// - Lines are filtered with the guild prefixes; empty lines are skipped.
/// - Splits lines into chunks (based on CPU cores * factor).
/// - Spawns threads to build partial models for each chunk.
/// - Merges all partial models, then merges the result into the stored model.
///
/// # Returns
/// The number of pairs learned.
pub fn import_lines<B: Backend>(store: &ModelStore<B>, key: ChannelKey, lines: &[String]) -> Result<usize> {
	let config = store.get_config(key.guild)?;
	let lines: Vec<&str> = lines
		.iter()
		.map(String::as_str)
		.filter(|line| !line.is_empty() && !is_command(line, config.prefixes()))
		.collect();
	if lines.is_empty() {
		return Ok(0);
	}

	let chunks = num_cpus::get() * 8;
	let chunk_size = lines.len().div_ceil(chunks);

	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for chunk in lines.chunks(chunk_size) {
			let tx = tx.clone();
			scope.spawn(move || {
				let mut partial_model = ChannelModel::new();
				let pairs: usize = chunk.iter().map(|line| partial_model.add_message(line)).sum();
				// The receiver outlives the scope
				let _ = tx.send((partial_model, pairs));
			});
		}
	});
	drop(tx);

	let mut imported = ChannelModel::new();
	let mut total = 0;
	for (partial_model, pairs) in rx.iter() {
		imported.merge(&partial_model)?;
		total += pairs;
	}

	store.mutate(key, |model| model.merge(&imported))??;
	debug!("imported {} lines ({total} pairs) into {key}", lines.len());
	Ok(total)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::GuildSetting;
	use crate::store::MemoryBackend;

	const BOT: UserId = 99;
	const KEY: ChannelKey = ChannelKey { guild: 1, channel: 2 };

	fn record(text: &str) -> Record<'_> {
		Record { key: KEY, author: 5, text }
	}

	#[test]
	fn test_ingest_learns_pairs() {
		let store = ModelStore::new(MemoryBackend::new());
		assert_eq!(ingest(&store, BOT, &record("hello world foo")).unwrap(), Ingestion::Learned { pairs: 2 });
		ingest(&store, BOT, &record("hello world bar")).unwrap();

		let model = store.get(KEY).unwrap().unwrap();
		assert_eq!(model.count("hello", "world"), 2);
		assert_eq!(model.count("world", "foo"), 1);
		assert_eq!(model.count("world", "bar"), 1);
		assert_eq!(model.len(), 2);
	}

	#[test]
	fn test_skips() {
		let store = ModelStore::new(MemoryBackend::new());
		store.set_config(KEY.guild, GuildSetting::Prefixes(vec!["!".to_owned()])).unwrap();

		assert_eq!(ingest(&store, BOT, &record("")).unwrap(), Ingestion::Skipped(SkipReason::EmptyText));
		assert_eq!(
			ingest(&store, BOT, &Record { key: KEY, author: BOT, text: "my own words" }).unwrap(),
			Ingestion::Skipped(SkipReason::OwnMessage)
		);
		assert_eq!(ingest(&store, BOT, &record("!help me please")).unwrap(), Ingestion::Skipped(SkipReason::Command));
		assert!(store.get(KEY).unwrap().is_none());
	}

	#[test]
	fn test_channels_are_isolated() {
		let store = ModelStore::new(MemoryBackend::new());
		let other = ChannelKey { guild: 1, channel: 3 };
		ingest(&store, BOT, &record("only here")).unwrap();
		ingest(&store, BOT, &Record { key: other, author: 5, text: "only there" }).unwrap();

		assert_eq!(store.get(KEY).unwrap().unwrap().count("only", "there"), 0);
		assert_eq!(store.get(other).unwrap().unwrap().count("only", "there"), 1);
	}

	#[test]
	fn test_import_matches_sequential_ingestion() {
		let lines: Vec<String> = (0..500).map(|i| format!("line {} ends here", i % 7)).collect();

		let imported = ModelStore::new(MemoryBackend::new());
		let pairs = import_lines(&imported, KEY, &lines).unwrap();
		assert_eq!(pairs, 500 * 3);

		let sequential = ModelStore::new(MemoryBackend::new());
		for line in &lines {
			ingest(&sequential, BOT, &record(line)).unwrap();
		}

		assert_eq!(*imported.get(KEY).unwrap().unwrap(), *sequential.get(KEY).unwrap().unwrap());
	}

	#[test]
	fn test_import_filters_commands() {
		let store = ModelStore::new(MemoryBackend::new());
		store.set_config(KEY.guild, GuildSetting::Prefixes(vec!["m!".to_owned()])).unwrap();
		let lines = vec!["m!generate now".to_owned(), String::new(), "keep this".to_owned()];

		assert_eq!(import_lines(&store, KEY, &lines).unwrap(), 1);
		let model = store.get(KEY).unwrap().unwrap();
		assert!(!model.contains_key("m!generate"));
		assert_eq!(model.count("keep", "this"), 1);
	}
}
