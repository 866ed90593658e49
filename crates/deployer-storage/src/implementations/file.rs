//! File-based storage backend.
//!
//! Each key is stored as `<base>/<key>/signatures.json`. Writes take an
//! exclusive advisory lock on `<base>/<key>/.signatures.lock`, re-check the
//! stored version, then write a temp file and rename it over the target.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, StoreVersion};
use async_trait::async_trait;
use deployer_types::ImplementationRegistry;
use fs2::FileExt;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name of a signature store inside its key directory.
pub const SIGNATURES_FILE: &str = "signatures.json";
const LOCK_FILE: &str = ".signatures.lock";

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory holding one sub-directory per key.
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Returns the path of the file backing `key`.
	pub fn file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(key).join(SIGNATURES_FILE)
	}

	fn lock_path(&self, key: &str) -> PathBuf {
		self.base_path.join(key).join(LOCK_FILE)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);
		match tokio::fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(format!(
				"Cannot read {}: {}",
				path.display(),
				e
			))),
		}
	}

	async fn compare_and_set(
		&self,
		key: &str,
		expected: StoreVersion,
		value: Vec<u8>,
	) -> Result<(), StorageError> {
		let path = self.file_path(key);
		let lock_path = self.lock_path(key);
		let key = key.to_string();

		tokio::task::spawn_blocking(move || {
			write_locked(&key, &path, &lock_path, expected, &value)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("Write task failed: {}", e)))?
	}
}

fn backend_error(path: &Path, e: std::io::Error) -> StorageError {
	StorageError::Backend(format!("{}: {}", path.display(), e))
}

fn write_locked(
	key: &str,
	path: &Path,
	lock_path: &Path,
	expected: StoreVersion,
	value: &[u8],
) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(|e| backend_error(parent, e))?;
	}

	let lock = OpenOptions::new()
		.create(true)
		.truncate(false)
		.write(true)
		.open(lock_path)
		.map_err(|e| backend_error(lock_path, e))?;
	lock.lock_exclusive()
		.map_err(|e| backend_error(lock_path, e))?;

	let result = replace_if_unchanged(key, path, expected, value);

	if let Err(e) = FileExt::unlock(&lock) {
		tracing::warn!(path = %lock_path.display(), error = %e, "Failed to release store lock");
	}
	result
}

fn replace_if_unchanged(
	key: &str,
	path: &Path,
	expected: StoreVersion,
	value: &[u8],
) -> Result<(), StorageError> {
	let found = match fs::read(path) {
		Ok(current) => StoreVersion::of(&current),
		Err(e) if e.kind() == ErrorKind::NotFound => StoreVersion::Absent,
		Err(e) => return Err(backend_error(path, e)),
	};
	if found != expected {
		return Err(StorageError::Conflict {
			key: key.to_string(),
			expected,
			found,
		});
	}

	let temp_path = path.with_extension("json.tmp");
	fs::write(&temp_path, value).map_err(|e| backend_error(&temp_path, e))?;
	fs::rename(&temp_path, path).map_err(|e| backend_error(path, e))?;

	tracing::debug!(path = %path.display(), bytes = value.len(), "Wrote store file");
	Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileStorageConfig {
	storage_path: Option<PathBuf>,
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for the stores (default: the deterministic config directory)
pub fn create_storage(
	config: &toml::Value,
	default_path: &Path,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	let config: FileStorageConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| StorageError::Configuration(e.message().to_string()))?;
	let base_path = config
		.storage_path
		.unwrap_or_else(|| default_path.to_path_buf());

	Ok(Box::new(FileStorage::new(base_path)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_missing_file_is_not_found() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		let result = storage.get_bytes("factoryProxy").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_write_creates_key_directory() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.compare_and_set("upgradeGate", StoreVersion::Absent, b"{}".to_vec())
			.await
			.unwrap();

		let path = dir.path().join("upgradeGate").join(SIGNATURES_FILE);
		assert_eq!(fs::read(&path).unwrap(), b"{}");
		assert!(!path.with_extension("json.tmp").exists());
		assert_eq!(storage.get_bytes("upgradeGate").await.unwrap(), b"{}");
	}

	#[tokio::test]
	async fn test_write_with_current_version() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		storage
			.compare_and_set("factoryProxy", StoreVersion::Absent, b"{}".to_vec())
			.await
			.unwrap();

		let version = StoreVersion::of(b"{}");
		storage
			.compare_and_set("factoryProxy", version, br#"{"1":"0x01"}"#.to_vec())
			.await
			.unwrap();
		assert_eq!(
			storage.get_bytes("factoryProxy").await.unwrap(),
			br#"{"1":"0x01"}"#
		);
	}

	#[tokio::test]
	async fn test_external_change_is_a_conflict() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		storage
			.compare_and_set("factoryProxy", StoreVersion::Absent, b"{}".to_vec())
			.await
			.unwrap();

		let path = storage.file_path("factoryProxy");
		fs::write(&path, br#"{"10":"0x02"}"#).unwrap();

		let err = storage
			.compare_and_set(
				"factoryProxy",
				StoreVersion::of(b"{}"),
				br#"{"1":"0x01"}"#.to_vec(),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, StorageError::Conflict { .. }));
		assert_eq!(fs::read(&path).unwrap(), br#"{"10":"0x02"}"#);
	}

	#[test]
	fn test_factory_defaults_to_given_path() {
		let dir = TempDir::new().unwrap();
		let config = toml::Value::Table(toml::map::Map::new());
		assert!(create_storage(&config, dir.path()).is_ok());
	}

	#[test]
	fn test_factory_rejects_unknown_fields() {
		let dir = TempDir::new().unwrap();
		let config: toml::Value = toml::from_str("ttl_orders = 10").unwrap();
		let result = create_storage(&config, dir.path());
		assert!(matches!(result, Err(StorageError::Configuration(_))));
	}
}
