//! Scope merging and canonical fingerprinting used across the engine.
//!
//! Two representations coexist on purpose: the merged, order-preserving scope
//! string that travels on authorize URLs and session requests, and the sorted
//! fingerprint used for cache-key equality so differently-ordered but
//! set-equal scope strings collide to the same cache entry.

// std
use std::collections::HashSet;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Merges any number of space-separated scope fragments into one
/// space-separated string with duplicates removed, preserving first-seen
/// order. `None` and empty fragments are tolerated without inserting stray
/// whitespace.
pub fn merge<'a, I>(fragments: I) -> String
where
	I: IntoIterator<Item = Option<&'a str>>,
{
	let mut seen = HashSet::new();
	let mut merged = Vec::new();

	for fragment in fragments.into_iter().flatten() {
		for token in fragment.split_whitespace() {
			if seen.insert(token) {
				merged.push(token);
			}
		}
	}

	merged.join(" ")
}

/// Stable fingerprint for a merged scope string.
///
/// Tokens are sorted and deduplicated before hashing, so set-equal scope
/// strings produce the same fingerprint regardless of order. The result is a
/// base64url (no padding) SHA-256 digest, safe to embed in storage keys.
pub fn fingerprint(scope: &str) -> String {
	let mut tokens: Vec<&str> = scope.split_whitespace().collect();

	tokens.sort_unstable();
	tokens.dedup();

	let mut hasher = Sha256::new();

	hasher.update(tokens.join(" ").as_bytes());

	let digest = hasher.finalize();

	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn merge_deduplicates_preserving_first_seen_order() {
		assert_eq!(merge([Some("openid profile"), Some("profile email")]), "openid profile email");
		assert_eq!(merge([Some("openid"), None, Some("openid")]), "openid");
	}

	#[test]
	fn merge_is_idempotent() {
		let once = merge([Some("openid profile email")]);
		let twice = merge([Some(once.as_str()), Some(once.as_str())]);

		assert_eq!(once, twice);
	}

	#[test]
	fn merge_tolerates_empty_and_missing_fragments() {
		assert_eq!(merge([None, Some(""), Some("   ")]), "");
		assert_eq!(merge([Some(""), Some("openid"), None]), "openid");
	}

	#[test]
	fn fingerprint_is_order_insensitive() {
		assert_eq!(fingerprint("openid profile email"), fingerprint("email openid profile"));
		assert_ne!(fingerprint("openid profile"), fingerprint("openid email"));
	}

	#[test]
	fn fingerprint_ignores_duplicates() {
		assert_eq!(fingerprint("openid openid profile"), fingerprint("profile openid"));
	}
}
