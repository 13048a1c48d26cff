use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rs_markov_core::UserId;

/// Above this many tracked users, expired entries are dropped on the next call.
const PRUNE_THRESHOLD: usize = 1024;

/// Allows one call per user per `window`.
///
/// A zero window disables the limit.
pub struct RateLimiter {
	window: Duration,
	last_calls: Mutex<HashMap<UserId, Instant>>,
}

impl RateLimiter {
	pub fn new(window: Duration) -> Self {
		Self { window, last_calls: Mutex::new(HashMap::new()) }
	}

	/// Records a call from `user`.
	///
	/// # Errors
	/// Returns the remaining wait if the user called less than `window` ago.
	pub fn check(&self, user: UserId) -> Result<(), Duration> {
		self.check_at(user, Instant::now())
	}

	fn check_at(&self, user: UserId, now: Instant) -> Result<(), Duration> {
		if self.window.is_zero() {
			return Ok(());
		}

		let mut last_calls = self.last_calls.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(last) = last_calls.get(&user) {
			let elapsed = now.saturating_duration_since(*last);
			if elapsed < self.window {
				return Err(self.window - elapsed);
			}
		}

		if last_calls.len() > PRUNE_THRESHOLD {
			let window = self.window;
			last_calls.retain(|_, last| now.saturating_duration_since(*last) < window);
		}
		last_calls.insert(user, now);
		Ok(())
	}
}
