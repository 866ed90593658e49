//! In-memory storage backend.
//!
//! Useful for tests and dry runs where nothing should be written to disk.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, StoreVersion};
use async_trait::async_trait;
use deployer_types::ImplementationRegistry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn compare_and_set(
		&self,
		key: &str,
		expected: StoreVersion,
		value: Vec<u8>,
	) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		let found = store
			.get(key)
			.map_or(StoreVersion::Absent, |current| StoreVersion::of(current));
		if found != expected {
			return Err(StorageError::Conflict {
				key: key.to_string(),
				expected,
				found,
			});
		}
		store.insert(key.to_string(), value);
		Ok(())
	}
}

/// Factory function to create a memory storage backend.
///
/// Configuration parameters:
/// - None
pub fn create_storage(
	_config: &toml::Value,
	_default_path: &Path,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
