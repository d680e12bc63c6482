//! Core value types: millisecond timestamps and the clock seam.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	/// Current wall-clock time
	pub fn now() -> Self {
		let ms = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as i64)
			.unwrap_or_default();
		Self(ms)
	}

	/// `now + seconds`
	pub fn from_now(seconds: i64) -> Self {
		Self::now().add_seconds(seconds)
	}

	pub fn add_seconds(self, seconds: i64) -> Self {
		Self(self.0 + seconds * 1000)
	}

	pub fn add_millis(self, millis: i64) -> Self {
		Self(self.0 + millis)
	}

	/// Whole seconds since the epoch (JWT claims use seconds)
	pub fn as_secs(self) -> i64 {
		self.0 / 1000
	}

	/// Elapsed milliseconds since `earlier`; negative if `earlier` is in the future
	pub fn since(self, earlier: Timestamp) -> i64 {
		self.0 - earlier.0
	}
}

/// Tri-state field for PATCH-style updates: absent, explicit null, or a
/// value. With `#[serde(default)]` an absent JSON field deserializes to
/// `Missing`, `null` to `Null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Patch<T> {
	#[default]
	Missing,
	Null,
	Value(T),
}

impl<T> Patch<T> {
	pub fn is_missing(&self) -> bool {
		matches!(self, Patch::Missing)
	}

	/// `None` when the field was absent; `Some(inner)` otherwise
	pub fn into_change(self) -> Option<Option<T>> {
		match self {
			Patch::Missing => None,
			Patch::Null => Some(None),
			Patch::Value(v) => Some(Some(v)),
		}
	}

	pub fn as_ref(&self) -> Patch<&T> {
		match self {
			Patch::Missing => Patch::Missing,
			Patch::Null => Patch::Null,
			Patch::Value(v) => Patch::Value(v),
		}
	}
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(match Option::<T>::deserialize(deserializer)? {
			Some(v) => Patch::Value(v),
			None => Patch::Null,
		})
	}
}

/// Time source seam.
///
/// Every component with expiry, grace, or cooldown logic reads time
/// through this trait so tests can jump the clock instead of sleeping.
pub trait Clock: Debug + Send + Sync {
	fn now(&self) -> Timestamp;
}

/// Wall clock, the production time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::now()
	}
}

/// Settable clock for tests
#[derive(Debug)]
pub struct ManualClock {
	now: parking_lot::Mutex<Timestamp>,
}

impl ManualClock {
	pub fn new(start: Timestamp) -> Self {
		Self { now: parking_lot::Mutex::new(start) }
	}

	pub fn set(&self, now: Timestamp) {
		*self.now.lock() = now;
	}

	pub fn advance_millis(&self, millis: i64) {
		let mut now = self.now.lock();
		*now = now.add_millis(millis);
	}

	pub fn advance_seconds(&self, seconds: i64) {
		self.advance_millis(seconds * 1000);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		*self.now.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timestamp_arithmetic() {
		let t = Timestamp(1_000_000);
		assert_eq!(t.add_seconds(5), Timestamp(1_005_000));
		assert_eq!(t.add_millis(-250), Timestamp(999_750));
		assert_eq!(t.add_seconds(5).since(t), 5_000);
		assert_eq!(Timestamp(7_200_500).as_secs(), 7_200);
	}

	#[test]
	fn test_manual_clock() {
		let clock = ManualClock::new(Timestamp(10_000));
		assert_eq!(clock.now(), Timestamp(10_000));
		clock.advance_seconds(60);
		assert_eq!(clock.now(), Timestamp(70_000));
		clock.set(Timestamp(5_000));
		assert_eq!(clock.now(), Timestamp(5_000));
	}
}

// vim: ts=4
