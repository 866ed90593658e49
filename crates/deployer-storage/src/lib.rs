//! Signature store persistence for the deterministic deployment signer.
//!
//! This module provides the low-level storage abstraction with file and
//! in-memory backends, and the [`SignatureService`] that loads, merges and
//! saves the per-proxy signature stores on top of it.
//!
//! Writes are compare-and-swap: a store is saved only if the backing value
//! still has the version observed when it was loaded, so two runs against the
//! same proxy kind cannot silently overwrite each other.

use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use deployer_types::{ChainId, ImplementationRegistry, ProxyKind, Signature, SignatureStore};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// The stored value exists but cannot be decoded.
	#[error("Corrupt store '{key}': {message}")]
	Corrupt { key: String, message: String },
	/// Error that occurs during serialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The stored value changed between load and save.
	#[error("Store '{key}' was modified concurrently (expected {expected}, found {found})")]
	Conflict {
		key: String,
		expected: StoreVersion,
		found: StoreVersion,
	},
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Version of a stored value, used as the precondition of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVersion {
	/// No value is stored under the key.
	Absent,
	/// keccak256 of the stored bytes.
	Hash(B256),
}

impl StoreVersion {
	pub fn of(bytes: &[u8]) -> Self {
		StoreVersion::Hash(keccak256(bytes))
	}
}

impl fmt::Display for StoreVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreVersion::Absent => f.write_str("absent"),
			StoreVersion::Hash(hash) => write!(f, "{}", hash),
		}
	}
}

/// Trait defining the low-level interface for storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key. Returns `NotFound` if nothing is stored.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores `value` under `key` if the current version equals `expected`,
	/// otherwise fails with `Conflict` and leaves the stored value untouched.
	async fn compare_and_set(
		&self,
		key: &str,
		expected: StoreVersion,
		value: Vec<u8>,
	) -> Result<(), StorageError>;
}

/// Type alias for storage factory functions.
///
/// The path is the deterministic config directory, used as the default
/// location by backends that persist to disk.
pub type StorageFactory =
	fn(&toml::Value, &Path) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// A signature store together with the version it was loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedStore {
	pub store: SignatureStore,
	pub version: StoreVersion,
}

/// Loads, merges and persists per-proxy signature stores.
pub struct SignatureService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl SignatureService {
	/// Creates a new SignatureService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Loads the store of `proxy_kind`.
	///
	/// A store that does not exist yet loads as empty with version `Absent`.
	/// A store that exists but is not a chain-id to signature object is fatal.
	pub async fn load(&self, proxy_kind: ProxyKind) -> Result<LoadedStore, StorageError> {
		let key = proxy_kind.as_str();
		let bytes = match self.backend.get_bytes(key).await {
			Ok(bytes) => bytes,
			Err(StorageError::NotFound) => {
				tracing::info!(proxy_kind = %proxy_kind, "No signature store yet, starting empty");
				return Ok(LoadedStore {
					store: SignatureStore::new(),
					version: StoreVersion::Absent,
				});
			},
			Err(e) => return Err(e),
		};

		let store = serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
			key: key.to_string(),
			message: e.to_string(),
		})?;
		Ok(LoadedStore {
			store,
			version: StoreVersion::of(&bytes),
		})
	}

	/// Returns `store` with `chain_id` set to `signature`; every other entry is kept.
	pub fn merge(store: SignatureStore, chain_id: ChainId, signature: Signature) -> SignatureStore {
		store.merged(chain_id, signature)
	}

	/// Overwrites the store of `proxy_kind` in full, provided it is still at `version`.
	pub async fn save(
		&self,
		proxy_kind: ProxyKind,
		version: StoreVersion,
		store: &SignatureStore,
	) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec_pretty(store)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_set(proxy_kind.as_str(), version, bytes)
			.await
	}

	/// Loads the store, merges one signature into it and saves it back.
	pub async fn record(
		&self,
		proxy_kind: ProxyKind,
		chain_id: ChainId,
		signature: Signature,
	) -> Result<SignatureStore, StorageError> {
		let LoadedStore { store, version } = self.load(proxy_kind).await?;
		let previous = store.len();
		let merged = Self::merge(store, chain_id, signature);
		self.save(proxy_kind, version, &merged).await?;

		tracing::info!(
			proxy_kind = %proxy_kind,
			chain_id,
			entries = merged.len(),
			added = merged.len() > previous,
			"Saved signature store"
		);
		Ok(merged)
	}
}
