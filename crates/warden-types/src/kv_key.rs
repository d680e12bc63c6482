//! Key-path encoding for the KV store.
//!
//! Logical keys are ordered sequences of string segments. The wire
//! encoding joins segments with `::`; an earlier generation of the data
//! used `U+001F` as separator. Readers accept both, writers emit only the
//! new form. Separator bytes inside a segment are stripped on encode so a
//! segment can never inject additional path levels.

use serde::{Deserialize, Serialize};

/// Separator emitted by every writer
pub const SEPARATOR: &str = "::";

/// Separator of the legacy encoding, accepted on read
pub const LEGACY_SEPARATOR: char = '\u{001F}';

/// An ordered sequence of key segments
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvKey(pub Vec<Box<str>>);

impl KvKey {
	pub fn new(segments: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
		Self(segments.into_iter().map(|s| Box::from(s.as_ref())).collect())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn push(&mut self, segment: impl AsRef<str>) {
		self.0.push(Box::from(segment.as_ref()));
	}

	/// New key with `segment` appended
	pub fn join(&self, segment: impl AsRef<str>) -> Self {
		let mut key = self.clone();
		key.push(segment);
		key
	}

	pub fn segment(&self, index: usize) -> Option<&str> {
		self.0.get(index).map(AsRef::as_ref)
	}

	pub fn starts_with(&self, prefix: &KvKey) -> bool {
		self.0.len() >= prefix.0.len()
			&& self.0.iter().zip(prefix.0.iter()).all(|(a, b)| a == b)
	}

	/// Key with `prefix` removed, or `None` if `prefix` does not match
	pub fn strip_prefix(&self, prefix: &KvKey) -> Option<KvKey> {
		if self.starts_with(prefix) {
			Some(KvKey(self.0[prefix.0.len()..].to_vec()))
		} else {
			None
		}
	}

	/// Encode to the wire form. Segments are sanitized: any occurrence of
	/// either separator inside a segment is removed.
	pub fn encode(&self) -> Box<str> {
		self.0
			.iter()
			.map(|seg| sanitize_segment(seg))
			.collect::<Vec<_>>()
			.join(SEPARATOR)
			.into_boxed_str()
	}

	/// Decode from either wire form. A string containing the legacy
	/// separator is treated as legacy-encoded; everything else splits on
	/// the current separator.
	pub fn decode(encoded: &str) -> Self {
		if encoded.contains(LEGACY_SEPARATOR) {
			Self(encoded.split(LEGACY_SEPARATOR).map(Box::from).collect())
		} else {
			Self(encoded.split(SEPARATOR).map(Box::from).collect())
		}
	}
}

fn sanitize_segment(segment: &str) -> String {
	segment.replace(SEPARATOR, "").replace(LEGACY_SEPARATOR, "")
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for KvKey {
	fn from(segments: [S; N]) -> Self {
		Self::new(segments)
	}
}

impl From<&[&str]> for KvKey {
	fn from(segments: &[&str]) -> Self {
		Self::new(segments)
	}
}

impl std::fmt::Display for KvKey {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.encode())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_round_trip() {
		let key = KvKey::from(["session", "browser", "acme", "sid-1"]);
		assert_eq!(KvKey::decode(&key.encode()), key);
	}

	#[test]
	fn test_legacy_decode() {
		let legacy = format!("tenant{}acme", LEGACY_SEPARATOR);
		assert_eq!(KvKey::decode(&legacy), KvKey::from(["tenant", "acme"]));
	}

	#[test]
	fn test_separator_injection_stripped() {
		let key = KvKey::from(["tenant", "a::b\u{001F}c"]);
		let encoded = key.encode();
		assert_eq!(encoded.as_ref(), "tenant::abc");
		assert_eq!(KvKey::decode(&encoded).len(), 2);
	}

	#[test]
	fn test_prefix_ops() {
		let key = KvKey::from(["rbac", "permissions", "t1", "u1", "c1"]);
		let prefix = KvKey::from(["rbac", "permissions", "t1", "u1"]);
		assert!(key.starts_with(&prefix));
		assert_eq!(key.strip_prefix(&prefix), Some(KvKey::from(["c1"])));
		assert_eq!(key.strip_prefix(&KvKey::from(["rbac", "other"])), None);
	}

	#[test]
	fn test_ordering_is_segment_wise() {
		let a = KvKey::from(["tenant", "a"]);
		let b = KvKey::from(["tenant", "a", "x"]);
		let c = KvKey::from(["tenant", "b"]);
		assert!(a < b);
		assert!(b < c);
	}
}

// vim: ts=4
