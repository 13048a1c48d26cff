//! Error kinds surfaced by the Markov subsystem.
//!
//! Only three kinds exist:
//! - `NoData`: generation was requested for a channel without a model
//! - `InvalidArgument`: an admin value was rejected
//! - `StorageFailure`: the persistence substrate failed
//!
//! `NoData` and `InvalidArgument` are user-facing and recoverable; the caller
//! formats them. `StorageFailure` aborts the operation with no partial effect.

use std::sync::PoisonError;

use crate::{ChannelId, GuildId};

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, MarkovError>;

#[derive(Debug, thiserror::Error)]
pub enum MarkovError {
	#[error("no data for channel {channel} (guild {guild}), talk in the channel first")]
	NoData { guild: GuildId, channel: ChannelId },

	#[error("invalid value for {field}: {value}")]
	InvalidArgument { field: &'static str, value: String },

	#[error(transparent)]
	StorageFailure(#[from] StorageError),
}

impl MarkovError {
	pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
		Self::InvalidArgument { field, value: value.to_string() }
	}
}

/// Failures of the persistence substrate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("encoding error: {0}")]
	Encoding(#[from] postcard::Error),

	#[error("failed to persist file: {0}")]
	Persist(#[from] tempfile::PersistError),

	#[error("store lock poisoned")]
	Poisoned,

	#[error("backend error: {0}")]
	Backend(String),
}

impl<T> From<PoisonError<T>> for StorageError {
	fn from(_: PoisonError<T>) -> Self {
		Self::Poisoned
	}
}

impl<T> From<PoisonError<T>> for MarkovError {
	fn from(_: PoisonError<T>) -> Self {
		Self::StorageFailure(StorageError::Poisoned)
	}
}
