//! Per-chain configuration resolution.
//!
//! Chain configuration is spread over two directories of JSON descriptors,
//! each named `<chainId>.json`:
//!
//! - chain descriptors carry the owner address of a chain;
//! - address descriptors carry the implementation addresses deployed on a chain.
//!
//! Implementation proxy kinds resolve from address descriptors and pull the
//! owner from the matching chain descriptor. The upgrade gate resolves from
//! chain descriptors alone. Chains that cannot produce a complete record are
//! reported as exclusions rather than dropped, so callers decide whether a
//! miss is fatal.

use crate::{Config, ConfigError, DescriptorFields};
use alloy_primitives::Address;
use deployer_types::{ChainConfig, ChainId, ImplementationKind, ProxyKind};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

type Descriptor = Map<String, Value>;

/// Why a discovered chain has no configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
	/// The address descriptor lacks the implementation field for this proxy kind.
	MissingImplementation,
	/// No owner could be read for the chain.
	MissingOwner,
}

/// Result of looking up one chain in a resolved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome<'a> {
	Found(&'a ChainConfig),
	Excluded(Exclusion),
	/// No descriptor was discovered for the chain.
	Absent,
}

/// Chain configuration resolved for one proxy kind.
#[derive(Debug, Clone)]
pub struct ResolvedChains {
	proxy_kind: ProxyKind,
	configs: BTreeMap<ChainId, ChainConfig>,
	excluded: BTreeMap<ChainId, Exclusion>,
}

impl ResolvedChains {
	pub fn configs(&self) -> &BTreeMap<ChainId, ChainConfig> {
		&self.configs
	}

	pub fn excluded(&self) -> &BTreeMap<ChainId, Exclusion> {
		&self.excluded
	}

	/// Returns the record for `chain_id`, or `ConfigNotFound` if the chain was
	/// excluded or never discovered.
	pub fn lookup(&self, chain_id: ChainId) -> Result<&ChainConfig, ConfigError> {
		self.configs
			.get(&chain_id)
			.ok_or(ConfigError::ConfigNotFound {
				proxy_kind: self.proxy_kind,
				chain_id,
			})
	}

	pub fn outcome(&self, chain_id: ChainId) -> ChainOutcome<'_> {
		if let Some(config) = self.configs.get(&chain_id) {
			ChainOutcome::Found(config)
		} else if let Some(exclusion) = self.excluded.get(&chain_id) {
			ChainOutcome::Excluded(*exclusion)
		} else {
			ChainOutcome::Absent
		}
	}
}

/// Loads descriptor files and cross-references them into chain configs.
///
/// Nothing is cached: every call to [`resolve`](Self::resolve) reads the
/// descriptors again.
#[derive(Debug, Clone)]
pub struct ChainConfigResolver {
	addresses_dir: PathBuf,
	chain_configs_dir: PathBuf,
	fields: DescriptorFields,
}

impl ChainConfigResolver {
	pub fn new(
		addresses_dir: impl Into<PathBuf>,
		chain_configs_dir: impl Into<PathBuf>,
		fields: DescriptorFields,
	) -> Self {
		Self {
			addresses_dir: addresses_dir.into(),
			chain_configs_dir: chain_configs_dir.into(),
			fields,
		}
	}

	pub fn from_config(config: &Config) -> Self {
		Self::new(
			config.addresses_dir(),
			config.chain_configs_dir(),
			config.descriptors.clone(),
		)
	}

	/// Resolves every chain visible on disk for `proxy_kind`.
	pub async fn resolve(&self, proxy_kind: ProxyKind) -> Result<ResolvedChains, ConfigError> {
		let entries = match proxy_kind.implementation() {
			Some(implementation) => self.resolve_implementations(implementation).await?,
			None => self.resolve_owners().await?,
		};

		let mut resolved = ResolvedChains {
			proxy_kind,
			configs: BTreeMap::new(),
			excluded: BTreeMap::new(),
		};
		for (chain_id, entry) in entries {
			match entry {
				Ok(config) => {
					resolved.configs.insert(chain_id, config);
				},
				Err(exclusion) => {
					resolved.excluded.insert(chain_id, exclusion);
				},
			}
		}

		tracing::debug!(
			proxy_kind = %proxy_kind,
			resolved = resolved.configs.len(),
			excluded = resolved.excluded.len(),
			"Resolved chain configs"
		);
		Ok(resolved)
	}

	fn implementation_field(&self, implementation: ImplementationKind) -> &str {
		match implementation {
			ImplementationKind::Factory => &self.fields.factory_implementation_field,
			ImplementationKind::Preminter => &self.fields.preminter_implementation_field,
		}
	}

	async fn resolve_implementations(
		&self,
		implementation: ImplementationKind,
	) -> Result<Vec<(ChainId, Result<ChainConfig, Exclusion>)>, ConfigError> {
		let field = self.implementation_field(implementation);
		let discovered = discover(&self.addresses_dir).await?;

		try_join_all(discovered.into_iter().map(|(chain_id, path)| async move {
			let descriptor = read_descriptor(&path).await?.unwrap_or_default();
			let Some(implementation) = address_field(&descriptor, field, &path)? else {
				return Ok((chain_id, Err(Exclusion::MissingImplementation)));
			};

			let entry = match self.owner_of(chain_id).await? {
				Some(owner) => Ok(ChainConfig::with_implementation(
					chain_id,
					owner,
					implementation,
				)),
				None => {
					tracing::warn!(
						chain_id,
						descriptor_field = field,
						"Address descriptor has no matching chain descriptor owner"
					);
					Err(Exclusion::MissingOwner)
				},
			};
			Ok::<_, ConfigError>((chain_id, entry))
		}))
		.await
	}

	async fn resolve_owners(
		&self,
	) -> Result<Vec<(ChainId, Result<ChainConfig, Exclusion>)>, ConfigError> {
		let discovered = discover(&self.chain_configs_dir).await?;

		try_join_all(discovered.into_iter().map(|(chain_id, path)| async move {
			let descriptor = read_descriptor(&path).await?.unwrap_or_default();
			let entry = address_field(&descriptor, &self.fields.owner_field, &path)?
				.map(|owner| ChainConfig::with_owner(chain_id, owner))
				.ok_or(Exclusion::MissingOwner);
			Ok::<_, ConfigError>((chain_id, entry))
		}))
		.await
	}

	/// Reads the owner from `chain_configs_dir/<chain_id>.json`.
	async fn owner_of(&self, chain_id: ChainId) -> Result<Option<Address>, ConfigError> {
		let path = self.chain_configs_dir.join(format!("{}.json", chain_id));
		match read_descriptor(&path).await? {
			Some(descriptor) => address_field(&descriptor, &self.fields.owner_field, &path),
			None => Ok(None),
		}
	}
}

/// Lists `<chainId>.json` files in `dir`. A missing directory yields nothing.
async fn discover(dir: &Path) -> Result<Vec<(ChainId, PathBuf)>, ConfigError> {
	let mut entries = match fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			tracing::debug!(dir = %dir.display(), "Descriptor directory does not exist");
			return Ok(Vec::new());
		},
		Err(e) => return Err(ConfigError::Io(e)),
	};

	let mut discovered = Vec::new();
	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();
		if path.extension() != Some(std::ffi::OsStr::new("json")) {
			continue;
		}
		match chain_id_from_path(&path) {
			Some(chain_id) => discovered.push((chain_id, path)),
			None => {
				tracing::debug!(
					path = %path.display(),
					"Skipping descriptor without a chain id name"
				);
			},
		}
	}
	Ok(discovered)
}

/// Extracts the chain id from a file name like `8453.json`.
///
/// The whole stem must be the canonical decimal form of the id, so that
/// `8453.old.json` or `08453.json` never shadow `8453.json`.
fn chain_id_from_path(path: &Path) -> Option<ChainId> {
	let stem = path.file_stem()?.to_str()?;
	if stem.is_empty() || stem.starts_with('0') || !stem.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	stem.parse::<ChainId>().ok()
}

/// Reads a JSON object descriptor. Returns `None` if the file does not exist.
async fn read_descriptor(path: &Path) -> Result<Option<Descriptor>, ConfigError> {
	let bytes = match fs::read(path).await {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => {
			return Err(ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			)))
		},
	};

	serde_json::from_slice::<Descriptor>(&bytes)
		.map(Some)
		.map_err(|e| ConfigError::Parse(format!("Invalid descriptor {}: {}", path.display(), e)))
}

/// Reads an optional address field. A present field that is not an address is an error.
fn address_field(
	descriptor: &Descriptor,
	field: &str,
	path: &Path,
) -> Result<Option<Address>, ConfigError> {
	match descriptor.get(field) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(raw)) => raw.parse::<Address>().map(Some).map_err(|e| {
			ConfigError::Parse(format!(
				"Invalid address in {} field '{}': {}",
				path.display(),
				field,
				e
			))
		}),
		Some(other) => Err(ConfigError::Parse(format!(
			"Field '{}' in {} must be an address string, got {}",
			field,
			path.display(),
			other
		))),
	}
}
