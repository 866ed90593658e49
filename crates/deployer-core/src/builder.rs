//! Builder for constructing a signing engine from configuration.
//!
//! Storage and account backends are pluggable: the caller supplies factory
//! maps keyed by implementation name, and the builder instantiates the
//! primary implementation of each section.

use crate::engine::SigningEngine;
use deployer_account::{AccountError, AccountInterface, AccountService};
use deployer_config::{ChainConfigResolver, Config};
use deployer_storage::{SignatureService, StorageError, StorageInterface};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component.
pub struct DeployerFactories<SF, AF> {
	pub storage_factories: HashMap<String, SF>,
	pub account_factories: HashMap<String, AF>,
}

/// Builder for a [`SigningEngine`].
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine from the primary storage and account implementations.
	pub async fn build<SF, AF>(
		self,
		factories: DeployerFactories<SF, AF>,
	) -> Result<SigningEngine, BuilderError>
	where
		SF: Fn(&toml::Value, &Path) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let deterministic_config_dir = self.config.deterministic_config_dir();

		let storage_name = &self.config.storage.primary;
		let storage_factory = factories
			.storage_factories
			.get(storage_name)
			.ok_or_else(|| BuilderError::MissingComponent(format!("storage '{}'", storage_name)))?;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(storage_name)
			.cloned()
			.unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));
		let storage_backend =
			match storage_factory(&storage_config, deterministic_config_dir.as_path()) {
				Ok(backend) => backend,
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %storage_name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						storage_name, e
					)));
				},
			};
		tracing::info!(component = "storage", implementation = %storage_name, "Loaded");

		let account_name = &self.config.account.primary;
		let account_factory = factories
			.account_factories
			.get(account_name)
			.ok_or_else(|| BuilderError::MissingComponent(format!("account '{}'", account_name)))?;
		let account_config = self
			.config
			.account
			.implementations
			.get(account_name)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary account '{}' has no configuration",
					account_name
				))
			})?;
		let account_backend = match account_factory(account_config) {
			Ok(backend) => backend,
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %account_name,
					error = %e,
					"Failed to create account implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					account_name, e
				)));
			},
		};
		let account = Arc::new(AccountService::new(account_backend));

		let signer = account.get_address().await.map_err(|e| {
			BuilderError::Config(format!("Failed to get signer address: {}", e))
		})?;
		tracing::info!(
			component = "account",
			implementation = %account_name,
			signer = %signer,
			"Loaded"
		);

		Ok(SigningEngine::new(
			ChainConfigResolver::from_config(&self.config),
			deterministic_config_dir,
			account,
			Arc::new(SignatureService::new(storage_backend)),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_account::AccountFactory;
	use deployer_storage::StorageFactory;
	use deployer_types::ProxyKind;
	use std::fs;
	use std::str::FromStr;
	use tempfile::TempDir;

	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn factories() -> DeployerFactories<StorageFactory, AccountFactory> {
		DeployerFactories {
			storage_factories: deployer_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			account_factories: deployer_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	fn config(root: &Path, storage: &str, private_key: &str) -> Config {
		Config::from_str(&format!(
			r#"
[deployer]
root = "{}"

[account]
primary = "local"

[account.implementations.local]
private_key = "{}"

[storage]
primary = "{}"

[storage.implementations.{}]
"#,
			root.display(),
			private_key,
			storage,
			storage
		))
		.unwrap()
	}

	fn write_fixture(root: &Path) {
		let files = [
			(
				"addresses/8453.json",
				r#"{"FACTORY_IMPL":"0x2222222222222222222222222222222222222222"}"#.to_string(),
			),
			(
				"chainConfigs/8453.json",
				r#"{"FACTORY_OWNER":"0x1111111111111111111111111111111111111111"}"#.to_string(),
			),
			(
				"deterministicConfig/factoryProxy/params.json",
				format!(
					r#"{{"proxyDeployerAddress":"0x{}","proxySalt":"0x{}","proxyShimSalt":"0x{}","proxyCreationCode":"0x6080"}}"#,
					"dd".repeat(20),
					"01".repeat(32),
					"02".repeat(32)
				),
			),
			(
				"deterministicConfig/upgradeGate/params.json",
				format!(
					r#"{{"creationCode":"0x6080","salt":"0x{}","deployerAddress":"0x{a}","upgradeGateAddress":"0x{a}","proxyDeployerAddress":"0x{a}"}}"#,
					"03".repeat(32),
					a = "ee".repeat(20)
				),
			),
		];
		for (relative, contents) in files {
			let path = root.join(relative);
			fs::create_dir_all(path.parent().unwrap()).unwrap();
			fs::write(path, contents).unwrap();
		}
	}

	#[tokio::test]
	async fn test_build_and_run_with_file_storage() {
		let dir = TempDir::new().unwrap();
		write_fixture(dir.path());

		let engine = EngineBuilder::new(config(dir.path(), "file", ANVIL_KEY))
			.build(factories())
			.await
			.unwrap();
		let report = engine.run(8453).await.unwrap();
		assert_eq!(report.signed(), 2);

		for kind in [ProxyKind::FactoryProxy, ProxyKind::UpgradeGate] {
			assert!(dir
				.path()
				.join("deterministicConfig")
				.join(kind.as_str())
				.join("signatures.json")
				.exists());
		}
	}

	#[tokio::test]
	async fn test_memory_storage_writes_nothing() {
		let dir = TempDir::new().unwrap();
		write_fixture(dir.path());

		let engine = EngineBuilder::new(config(dir.path(), "memory", ANVIL_KEY))
			.build(factories())
			.await
			.unwrap();
		engine.run(8453).await.unwrap();

		assert!(!dir
			.path()
			.join("deterministicConfig/factoryProxy/signatures.json")
			.exists());
	}

	#[tokio::test]
	async fn test_invalid_key_fails_to_build() {
		let dir = TempDir::new().unwrap();
		let result = EngineBuilder::new(config(dir.path(), "file", "0x1234"))
			.build(factories())
			.await;
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}

	#[tokio::test]
	async fn test_unknown_factory() {
		let dir = TempDir::new().unwrap();
		let mut factories = factories();
		factories.account_factories.clear();

		let result = EngineBuilder::new(config(dir.path(), "file", ANVIL_KEY))
			.build(factories)
			.await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}
}
