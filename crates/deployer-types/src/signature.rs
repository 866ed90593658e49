//! Signatures and the per-proxy signature store.

use crate::ChainId;
use alloy_primitives::hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An opaque signature as persisted: `0x` followed by 130 hex characters
/// (`r || s || v`, with `v` in {27, 28}).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
	/// Wraps a signature string read from a store without reinterpreting it.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Encodes a raw 65-byte signature.
	pub fn from_bytes(bytes: [u8; 65]) -> Self {
		Self(hex::encode_prefixed(bytes))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<alloy_primitives::Signature> for Signature {
	fn from(sig: alloy_primitives::Signature) -> Self {
		Self::from_bytes(sig.as_bytes())
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Signature({})", self.0)
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Signatures for one proxy kind, keyed by chain id.
///
/// Serializes as a flat JSON object with decimal chain-id keys in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureStore(BTreeMap<ChainId, Signature>);

impl SignatureStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, chain_id: ChainId) -> Option<&Signature> {
		self.0.get(&chain_id)
	}

	pub fn contains(&self, chain_id: ChainId) -> bool {
		self.0.contains_key(&chain_id)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
		self.0.keys().copied()
	}

	/// Returns the store with `chain_id` set to `signature`.
	///
	/// Every other entry is carried over untouched; merges never remove keys.
	pub fn merged(mut self, chain_id: ChainId, signature: Signature) -> Self {
		self.0.insert(chain_id, signature);
		self
	}
}

impl FromIterator<(ChainId, Signature)> for SignatureStore {
	fn from_iter<I: IntoIterator<Item = (ChainId, Signature)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
