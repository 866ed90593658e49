//! Configuration module for the deterministic deployment signer.
//!
//! This module provides the application configuration loaded from TOML, the
//! per-chain descriptor resolution and the typed loading of deployment
//! parameters. Environment variables referenced as `${VAR}` or
//! `${VAR:-default}` are substituted before the TOML is parsed, which is how
//! the signer's private key reaches the account configuration.

pub mod params;
pub mod resolver;

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use deployer_types::{ChainId, ProxyKind};

pub use params::{load_params, params_path, DeploymentParams, PARAMS_FILE};
pub use resolver::{ChainConfigResolver, ChainOutcome, Exclusion, ResolvedChains};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when a TOML or JSON input cannot be parsed.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The requested chain id is not part of the resolved configuration set.
	#[error("No {proxy_kind} chain config found for chain id {chain_id}")]
	ConfigNotFound {
		proxy_kind: ProxyKind,
		chain_id: ChainId,
	},
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the signer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Base directory settings.
	#[serde(default)]
	pub deployer: DeployerConfig,
	/// Input and output directory layout, relative to `deployer.root`.
	#[serde(default)]
	pub paths: PathsConfig,
	/// Field names read from chain and address descriptors.
	#[serde(default)]
	pub descriptors: DescriptorFields,
	/// Configuration for the signing account.
	pub account: AccountConfig,
	/// Configuration for the signature store backend.
	#[serde(default)]
	pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
	/// Directory that relative paths are resolved against.
	#[serde(default = "default_root")]
	pub root: PathBuf,
}

impl Default for DeployerConfig {
	fn default() -> Self {
		Self {
			root: default_root(),
		}
	}
}

fn default_root() -> PathBuf {
	PathBuf::from(".")
}

/// Directory layout of the deployment repository.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
	/// Address descriptors, one `<chainId>.json` per chain.
	#[serde(default = "default_addresses_dir")]
	pub addresses: PathBuf,
	/// Chain descriptors, one `<chainId>.json` per chain.
	#[serde(default = "default_chain_configs_dir")]
	pub chain_configs: PathBuf,
	/// One sub-directory per proxy kind holding `params.json` and `signatures.json`.
	#[serde(default = "default_deterministic_config_dir")]
	pub deterministic_config: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			addresses: default_addresses_dir(),
			chain_configs: default_chain_configs_dir(),
			deterministic_config: default_deterministic_config_dir(),
		}
	}
}

fn default_addresses_dir() -> PathBuf {
	PathBuf::from("addresses")
}

fn default_chain_configs_dir() -> PathBuf {
	PathBuf::from("chainConfigs")
}

fn default_deterministic_config_dir() -> PathBuf {
	PathBuf::from("deterministicConfig")
}

/// Keys looked up inside descriptor files.
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorFields {
	/// Owner address in chain descriptors.
	#[serde(default = "default_owner_field")]
	pub owner_field: String,
	/// Factory implementation address in address descriptors.
	#[serde(default = "default_factory_implementation_field")]
	pub factory_implementation_field: String,
	/// Premint executor implementation address in address descriptors.
	#[serde(default = "default_preminter_implementation_field")]
	pub preminter_implementation_field: String,
}

impl Default for DescriptorFields {
	fn default() -> Self {
		Self {
			owner_field: default_owner_field(),
			factory_implementation_field: default_factory_implementation_field(),
			preminter_implementation_field: default_preminter_implementation_field(),
		}
	}
}

fn default_owner_field() -> String {
	"FACTORY_OWNER".to_string()
}

fn default_factory_implementation_field() -> String {
	"FACTORY_IMPL".to_string()
}

fn default_preminter_implementation_field() -> String {
	"PREMINTER_IMPL".to_string()
}

/// Configuration for the signing account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the signature store backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	#[serde(default = "default_storage_primary")]
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	#[serde(default = "default_storage_implementations")]
	pub implementations: HashMap<String, toml::Value>,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			primary: default_storage_primary(),
			implementations: default_storage_implementations(),
		}
	}
}

fn default_storage_primary() -> String {
	"file".to_string()
}

fn default_storage_implementations() -> HashMap<String, toml::Value> {
	HashMap::from([(
		"file".to_string(),
		toml::Value::Table(toml::map::Map::new()),
	)])
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |cap: &regex::Captures<'_>| {
		let var_name = &cap[1];
		match (std::env::var(var_name), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	///
	/// A relative `deployer.root` is interpreted against the directory that
	/// contains the configuration file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;

		let mut config: Config = content.parse()?;
		if config.deployer.root.is_relative() {
			let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
			config.deployer.root = base_dir.join(&config.deployer.root);
		}
		Ok(config)
	}

	/// Directory holding address descriptors.
	pub fn addresses_dir(&self) -> PathBuf {
		self.deployer.root.join(&self.paths.addresses)
	}

	/// Directory holding chain descriptors.
	pub fn chain_configs_dir(&self) -> PathBuf {
		self.deployer.root.join(&self.paths.chain_configs)
	}

	/// Directory holding one sub-directory per proxy kind.
	pub fn deterministic_config_dir(&self) -> PathBuf {
		self.deployer.root.join(&self.paths.deterministic_config)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		let fields = [
			("owner_field", &self.descriptors.owner_field),
			(
				"factory_implementation_field",
				&self.descriptors.factory_implementation_field,
			),
			(
				"preminter_implementation_field",
				&self.descriptors.preminter_implementation_field,
			),
		];
		for (name, value) in fields {
			if value.is_empty() {
				return Err(ConfigError::Validation(format!(
					"descriptors.{} cannot be empty",
					name
				)));
			}
		}
		if self.descriptors.factory_implementation_field
			== self.descriptors.preminter_implementation_field
		{
			return Err(ConfigError::Validation(
				"Factory and preminter implementation fields must differ".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated.
/// Relative paths stay relative to the working directory.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
