//! Utility functions shared across the signer.

pub mod eip712;

pub use eip712::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DOMAIN_TYPE};

/// Truncates a hex string for log output.
///
/// Shows only the first 10 characters followed by ".." for longer strings.
pub fn truncate_hex(value: &str) -> String {
	if value.len() <= 10 {
		value.to_string()
	} else {
		format!("{}..", &value[..10])
	}
}
