use rand::Rng;

use super::channel_model::{ChannelModel, TOKEN_SEPARATOR};

/// Maximum number of bridge steps (draws from all keys) in one generation.
pub const MAX_TRIES: usize = 20;

/// Characters that end a sentence when found anywhere in the tail word.
pub const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '\r'];

/// Strategy used to select the starting words of a generation.
///
/// # Variants
/// - `Random`: start from a key chosen uniformly in the model.
/// - `Custom(&str)`: continue the given text. Only its last space-separated
///   token takes part; preceding words are discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartSeed<'a> {
	Random,
	Custom(&'a str),
}

impl<'a> From<Option<&'a str>> for StartSeed<'a> {
	fn from(seed: Option<&'a str>) -> Self {
		match seed {
			Some(text) => StartSeed::Custom(text),
			None => StartSeed::Random,
		}
	}
}

/// Generates word sequences from an immutable channel model snapshot.
///
/// # Termination
/// Every generation appends at most `max_len + MAX_TRIES` words: the loop
/// stops once `max_len` words are reached, after `MAX_TRIES` bridge steps,
/// or when the tail word contains a sentence terminator.
#[derive(Debug)]
pub struct Generator<'m> {
	model: &'m ChannelModel,
}

impl<'m> Generator<'m> {
	pub fn new(model: &'m ChannelModel) -> Self {
		Self { model }
	}

	/// Generates a sequence and joins it with single spaces.
	///
	/// # Parameters
	/// - `start_seed`: how the sequence starts.
	/// - `max_len`: budget, compared against the number of words.
	/// - `rng`: random source for every draw.
	///
	/// # Returns
	/// `None` if the model has no keys. Otherwise at least one word.
	///
	/// # Notes
	/// - A custom seed whose last token misses the model is followed by a
	///   random key, and that draw consumes one try.
	pub fn generate<R: Rng + ?Sized>(
		&self,
		start_seed: StartSeed<'_>,
		max_len: usize,
		rng: &mut R,
	) -> Option<String> {
		let mut tries = 0;
		let mut words: Vec<&str> = match start_seed {
			StartSeed::Random => vec![self.model.random_key(rng)?],
			StartSeed::Custom(seed) => {
				let last = last_token(seed);
				let next = match self.model.predict(last, rng) {
					Some(next) => next,
					None => {
						tries += 1;
						self.model.random_key(rng)?
					}
				};
				vec![last, next]
			}
		};

		while words.len() < max_len && tries < MAX_TRIES {
			// Never empty: both start strategies push at least one word
			let tail = words[words.len() - 1];
			if is_sentence_end(tail) {
				break;
			}

			match self.model.predict(tail, rng) {
				Some(next) => words.push(next),
				None => {
					words.push(self.model.random_key(rng)?);
					tries += 1;
				}
			}
		}

		Some(words.join(" "))
	}
}

/// Returns the last token of `text` split on the single space.
fn last_token(text: &str) -> &str {
	text.rsplit(TOKEN_SEPARATOR).next().unwrap_or(text)
}

fn is_sentence_end(word: &str) -> bool {
	word.contains(SENTENCE_TERMINATORS)
}
