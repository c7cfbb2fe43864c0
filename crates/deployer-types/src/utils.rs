//! Helper functions shared by the deployer crates.

use alloy_primitives::B256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

/// Shortens a hash for log output, e.g. `0x1234abcd…9f0e`.
pub fn short_hash(hash: &B256) -> String {
	let full = hash.to_string();
	if full.len() <= 14 {
		return full;
	}
	format!("{}…{}", &full[..10], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_short_hash() {
		let hash = B256::repeat_byte(0xab);
		let short = short_hash(&hash);
		assert!(short.starts_with("0xabababab"));
		assert!(short.ends_with("abab"));
		assert!(short.contains('…'));
	}

	#[test]
	fn test_current_timestamp_is_after_2020() {
		assert!(current_timestamp() > 1_577_836_800);
	}
}
