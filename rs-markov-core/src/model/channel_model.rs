use std::collections::BTreeMap;

use rand::Rng;
use rand::prelude::IteratorRandom;
use serde::{Deserialize, Serialize};

use super::state::State;
use crate::error::Result;

/// The only token separator. Runs of spaces yield empty tokens, and tabs or
/// newlines stay inside tokens.
pub const TOKEN_SEPARATOR: char = ' ';

/// Splits a message into words on the single ASCII space.
///
/// No trimming and no collapsing: `"a  b"` yields `["a", "", "b"]`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
	text.split(TOKEN_SEPARATOR)
}

/// First-order word transition table of a single channel.
///
/// # Responsibilities
/// - Learn adjacent word pairs from messages
/// - Predict a successor for a word
/// - Provide a uniformly random key for bridge steps
/// - Merge with another channel model (bulk import)
///
/// # Invariants
/// - Every key was seen followed by at least one token, except for states
///   built directly through `FromIterator`
/// - The count of `b` in `states[a]` equals the number of `(a, b)` pairs learned
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelModel {
	/// Mapping from a word to its corresponding state.
	/// Ordered, so key draws are reproducible with a seeded random source.
	states: BTreeMap<String, State>,
}

impl ChannelModel {
	/// Creates an empty model.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of distinct keys.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	pub fn contains_key(&self, word: &str) -> bool {
		self.states.contains_key(word)
	}

	/// Returns the state of `word`, if it was ever seen followed by a token.
	pub fn state(&self, word: &str) -> Option<&State> {
		self.states.get(word)
	}

	/// Number of times the pair `(word, next_word)` was learned.
	pub fn count(&self, word: &str, next_word: &str) -> usize {
		self.states.get(word).map_or(0, |state| state.count(next_word))
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.states.keys().map(String::as_str)
	}

	/// Learns every adjacent word pair of `text`.
	///
	/// Returns the number of pairs added. A single-word text adds nothing.
	pub fn add_message(&mut self, text: &str) -> usize {
		let words: Vec<&str> = tokenize(text).collect();

		for pair in words.windows(2) {
			self.add_pair(pair[0], pair[1]);
		}

		words.len().saturating_sub(1)
	}

	fn add_pair(&mut self, word: &str, next_word: &str) {
		match self.states.get_mut(word) {
			Some(state) => state.add_transition(next_word),
			None => {
				let mut state = State::new(word);
				state.add_transition(next_word);
				self.states.insert(word.to_owned(), state);
			}
		}
	}

	/// Returns a key chosen uniformly among all keys.
	///
	/// Returns `None` if the model is empty.
	pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		self.keys().choose(rng)
	}

	/// Predicts the word following `word`.
	///
	/// Returns `None` if `word` is unknown or has no successor.
	pub fn predict<R: Rng + ?Sized>(&self, word: &str, rng: &mut R) -> Option<&str> {
		self.states.get(word)?.predict(rng)
	}

	/// Merges another channel model into this one.
	///
	/// Occurrence counts for matching states and transitions are summed.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		for (key, state) in &other.states {
			if let Some(existing) = self.states.get_mut(key) {
				existing.merge(state)?;
			} else {
				self.states.insert(key.clone(), state.clone());
			}
		}

		Ok(())
	}
}

/// Builds a model from explicit successor lists, duplicates counting as weight.
///
/// An empty list produces a key without successors, a shape ingestion never creates.
impl<K, V> FromIterator<(K, Vec<V>)> for ChannelModel
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	fn from_iter<I: IntoIterator<Item = (K, Vec<V>)>>(iter: I) -> Self {
		let mut model = Self::new();
		for (key, successors) in iter {
			let state = model
				.states
				.entry(key.as_ref().to_owned())
				.or_insert_with(|| State::new(key.as_ref()));
			for next_word in &successors {
				state.add_transition(next_word.as_ref());
			}
		}
		model
	}
}
