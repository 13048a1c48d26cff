use std::collections::BTreeMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};


/// Represents a word state in a channel model.
///
/// A `State` corresponds to one word (`key`) and stores every word observed
/// immediately after it, together with how many times that pair was seen.
///
/// Conceptually, this is a node in a first-order Markov chain where outgoing
/// edges are weighted by their number of observations. A counted multiset is
/// equivalent to a successor list with duplicates: picking uniformly over list
/// positions is the same as picking proportionally to counts.
///
/// ## Responsibilities:
/// - Accumulate successor occurrences during ingestion
/// - Predict the next word using weighted random sampling
/// - Merge with another state having the same key (bulk import support)
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - Each transition occurrence count is strictly positive
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct State {
	/// The word this state was created for.
	key: String,
	/// Successor words indexed by the word itself.
	/// The value represents how many times this pair was observed.
	/// Ordered, so a seeded random source always picks the same word.
	/// Example: { "world" => 2, "there" => 1 }
	transitions: BTreeMap<String, usize>
}

impl State {
	/// Creates a new empty state for the given word.
	pub fn new(key: &str) -> Self {
		Self {
			key: key.to_owned(),
			transitions: BTreeMap::new(),
		}
	}

	/// Records one more occurrence of `next_word` following this state's key.
	pub fn add_transition(&mut self, next_word: &str) {
		match self.transitions.get_mut(next_word) {
			Some(occurrence) => *occurrence += 1,
			None => {
				self.transitions.insert(next_word.to_owned(), 1);
			}
		}
	}

	/// Number of times `next_word` was observed after this state's key.
	pub fn count(&self, next_word: &str) -> usize {
		self.transitions.get(next_word).copied().unwrap_or(0)
	}

	/// Total number of observed pairs starting with this key.
	pub fn total(&self) -> usize {
		self.transitions.values().sum()
	}

	/// `true` when no successor was ever recorded.
	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Predicts the next word using weighted random sampling.
	///
	/// The probability of selecting a word is proportional to its
	/// occurrence count.
	///
	/// Returns `None` if the state has no transitions.
	pub fn predict<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		let total = self.total();
		if total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..total);

		let mut fallback: Option<&str> = None;
		for (next_word, occurrence) in &self.transitions {
			if r < *occurrence {
				return Some(next_word.as_str());
			}
			r -= occurrence;
			fallback = Some(next_word.as_str());
		}

		fallback
	}

	/// Merges another state into this one.
	///
	/// Both states must represent the same word (`key`).
	/// Transition occurrence counts are summed.
	///
	/// # Errors
	/// Returns `InvalidArgument` if the state keys do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.key != other.key {
			return Err(MarkovError::invalid("key", &other.key));
		}

		for (next_word, occurrence) in &other.transitions {
			*self.transitions.entry(next_word.clone()).or_insert(0) += *occurrence;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn test_add_transition_counts_duplicates() {
		let mut state = State::new("hello");
		state.add_transition("world");
		state.add_transition("world");
		state.add_transition("there");
		assert_eq!(state.count("world"), 2);
		assert_eq!(state.count("there"), 1);
		assert_eq!(state.count("nobody"), 0);
		assert_eq!(state.total(), 3);
	}

	#[test]
	fn test_predict_empty_state() {
		let state = State::new("q");
		let mut rng = StdRng::seed_from_u64(7);
		assert!(state.is_empty());
		assert_eq!(state.predict(&mut rng), None);
	}

	#[test]
	fn test_predict_is_weighted() {
		let mut state = State::new("a");
		for _ in 0..3 {
			state.add_transition("b");
		}
		state.add_transition("c");

		let mut rng = StdRng::seed_from_u64(42);
		let trials = 4000;
		let hits = (0..trials).filter(|_| state.predict(&mut rng) == Some("b")).count();
		let ratio = hits as f64 / trials as f64;
		assert!((0.70..0.80).contains(&ratio), "ratio was {ratio}");
	}

	#[test]
	fn test_predict_is_reproducible_with_seed() {
		let build = || {
			let mut state = State::new("a");
			for next_word in ["z", "m", "b", "q", "m", "x"] {
				state.add_transition(next_word);
			}
			state
		};

		let picks = |state: &State| {
			let mut rng = StdRng::seed_from_u64(42);
			let words: Vec<Option<String>> = (0..20).map(|_| state.predict(&mut rng).map(str::to_owned)).collect();
			words
		};

		let expected = picks(&build());
		for _ in 0..10 {
			assert_eq!(picks(&build()), expected);
		}
	}

	#[test]
	fn test_merge_sums_counts() {
		let mut left = State::new("a");
		left.add_transition("b");
		let mut right = State::new("a");
		right.add_transition("b");
		right.add_transition("c");

		left.merge(&right).unwrap();
		assert_eq!(left.count("b"), 2);
		assert_eq!(left.count("c"), 1);
	}

	#[test]
	fn test_merge_key_mismatch() {
		let mut left = State::new("a");
		let right = State::new("b");
		assert!(left.merge(&right).is_err());
	}
}
