//! Signing run orchestration.
//!
//! A run signs every proxy kind for one chain id, in the fixed order given by
//! [`ProxyKind::all`]. Each flow resolves the chain, then either signs and
//! records the result or applies the kind's miss policy. Flows never overlap.

use crate::payloads::{
	build_create_generic_contract, build_create_proxy, encode_initialize_call, PayloadError,
};
use deployer_account::{AccountError, AccountService};
use deployer_config::{
	load_params, ChainConfigResolver, ChainOutcome, ConfigError, DeploymentParams, Exclusion,
};
use deployer_storage::{SignatureService, StorageError};
use deployer_types::{truncate_hex, ChainConfig, ChainId, MissPolicy, ProxyKind, Signature};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A step of a signing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
	Init,
	Resolve(ProxyKind),
	Sign(ProxyKind),
	Skip(ProxyKind),
	AbortFatal,
	Done,
}

impl fmt::Display for RunState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunState::Init => f.write_str("init"),
			RunState::Resolve(kind) => write!(f, "resolve {}", kind),
			RunState::Sign(kind) => write!(f, "sign {}", kind),
			RunState::Skip(kind) => write!(f, "skip {}", kind),
			RunState::AbortFatal => f.write_str("abort"),
			RunState::Done => f.write_str("done"),
		}
	}
}

/// Why a flow found no configuration for the requested chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
	Excluded(Exclusion),
	Absent,
}

/// Result of one completed flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
	/// The request was signed and the store now holds `entries` signatures.
	Signed { signature: Signature, entries: usize },
	Skipped(Miss),
}

/// Record of everything a run did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
	chain_id: ChainId,
	states: Vec<RunState>,
	flows: Vec<(ProxyKind, FlowOutcome)>,
}

impl RunReport {
	fn new(chain_id: ChainId) -> Self {
		Self {
			chain_id,
			states: vec![RunState::Init],
			flows: Vec::new(),
		}
	}

	pub fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	/// States visited so far, starting with `Init`.
	pub fn states(&self) -> &[RunState] {
		&self.states
	}

	/// Flows that completed, in execution order.
	pub fn flows(&self) -> &[(ProxyKind, FlowOutcome)] {
		&self.flows
	}

	pub fn outcome(&self, proxy_kind: ProxyKind) -> Option<&FlowOutcome> {
		self.flows
			.iter()
			.find(|(kind, _)| *kind == proxy_kind)
			.map(|(_, outcome)| outcome)
	}

	/// Number of flows that produced a signature.
	pub fn signed(&self) -> usize {
		self.flows
			.iter()
			.filter(|(_, outcome)| matches!(outcome, FlowOutcome::Signed { .. }))
			.count()
	}

	fn enter(&mut self, state: RunState) {
		tracing::debug!(chain_id = self.chain_id, state = %state, "Run state");
		self.states.push(state);
	}

	fn complete(&mut self, proxy_kind: ProxyKind, outcome: FlowOutcome) {
		self.flows.push((proxy_kind, outcome));
	}
}

/// Error that stopped a flow.
#[derive(Debug, Error)]
pub enum FlowError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Payload(#[from] PayloadError),
	#[error(transparent)]
	Account(#[from] AccountError),
	#[error(transparent)]
	Storage(#[from] StorageError),
}

/// A run that ended in `AbortFatal`.
///
/// The report still lists the flows that completed before the failure, and
/// their stores are already persisted.
#[derive(Debug, Error)]
#[error("Signing run for chain {chain_id} aborted: {source}")]
pub struct EngineError {
	pub chain_id: ChainId,
	pub report: RunReport,
	pub source: FlowError,
}

/// Drives the signing flows for a chain.
pub struct SigningEngine {
	resolver: ChainConfigResolver,
	/// Directory holding `<proxyKind>/params.json`.
	params_dir: PathBuf,
	account: Arc<AccountService>,
	signatures: Arc<SignatureService>,
}

impl SigningEngine {
	pub fn new(
		resolver: ChainConfigResolver,
		params_dir: impl Into<PathBuf>,
		account: Arc<AccountService>,
		signatures: Arc<SignatureService>,
	) -> Self {
		Self {
			resolver,
			params_dir: params_dir.into(),
			account,
			signatures,
		}
	}

	/// Runs every flow for `chain_id`.
	pub async fn run(&self, chain_id: ChainId) -> Result<RunReport, EngineError> {
		let mut report = RunReport::new(chain_id);
		tracing::info!(chain_id, "Starting signing run");

		for proxy_kind in ProxyKind::all() {
			if let Err(source) = self.run_flow(proxy_kind, chain_id, &mut report).await {
				report.enter(RunState::AbortFatal);
				tracing::error!(
					chain_id,
					proxy_kind = %proxy_kind,
					error = %source,
					"Signing run aborted"
				);
				return Err(EngineError {
					chain_id,
					report,
					source,
				});
			}
		}

		report.enter(RunState::Done);
		tracing::info!(chain_id, signed = report.signed(), "Signing run complete");
		Ok(report)
	}

	async fn run_flow(
		&self,
		proxy_kind: ProxyKind,
		chain_id: ChainId,
		report: &mut RunReport,
	) -> Result<(), FlowError> {
		report.enter(RunState::Resolve(proxy_kind));
		let resolved = self.resolver.resolve(proxy_kind).await?;

		let miss = match resolved.outcome(chain_id) {
			ChainOutcome::Found(chain) => {
				report.enter(RunState::Sign(proxy_kind));
				let outcome = self.sign(proxy_kind, chain).await?;
				report.complete(proxy_kind, outcome);
				return Ok(());
			},
			ChainOutcome::Excluded(reason) => Miss::Excluded(reason),
			ChainOutcome::Absent => Miss::Absent,
		};

		match proxy_kind.miss_policy() {
			MissPolicy::Skip => {
				tracing::info!(
					chain_id,
					proxy_kind = %proxy_kind,
					reason = ?miss,
					"No chain config, skipping"
				);
				report.enter(RunState::Skip(proxy_kind));
				report.complete(proxy_kind, FlowOutcome::Skipped(miss));
				Ok(())
			},
			MissPolicy::Abort => Err(ConfigError::ConfigNotFound {
				proxy_kind,
				chain_id,
			}
			.into()),
		}
	}

	async fn sign(
		&self,
		proxy_kind: ProxyKind,
		chain: &ChainConfig,
	) -> Result<FlowOutcome, FlowError> {
		let request = match load_params(&self.params_dir, proxy_kind).await? {
			DeploymentParams::Proxy(config) => build_create_proxy(&config, chain)?,
			DeploymentParams::Generic(config) => build_create_generic_contract(
				&config,
				chain,
				encode_initialize_call(chain.owner),
			),
		};

		let signature = self.account.sign(&request).await?;
		tracing::info!(
			chain_id = chain.chain_id,
			proxy_kind = %proxy_kind,
			signature = %truncate_hex(signature.as_str()),
			"Signed deployment"
		);

		let store = self
			.signatures
			.record(proxy_kind, chain.chain_id, signature.clone())
			.await?;
		Ok(FlowOutcome::Signed {
			signature,
			entries: store.len(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::payloads::{build_create_proxy, create_proxy_fields};
	use alloy_primitives::{Address, Bytes, B256};
	use async_trait::async_trait;
	use deployer_account::implementations::local::LocalAccount;
	use deployer_account::AccountInterface;
	use deployer_config::DescriptorFields;
	use deployer_storage::implementations::file::FileStorage;
	use deployer_types::{DeterministicProxyConfig, SecretString, SignatureStore, TypedData};
	use std::fs;
	use std::path::Path;
	use tempfile::TempDir;

	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const OWNER: &str = "0x1111111111111111111111111111111111111111";
	const FACTORY_IMPL: &str = "0x2222222222222222222222222222222222222222";
	const PREMINTER_IMPL: &str = "0x3333333333333333333333333333333333333333";

	struct Fixture {
		dir: TempDir,
	}

	impl Fixture {
		fn new() -> Self {
			let fixture = Self {
				dir: TempDir::new().unwrap(),
			};
			fixture.write(
				"deterministicConfig/factoryProxy/params.json",
				&proxy_params(0x01),
			);
			fixture.write(
				"deterministicConfig/premintExecutorProxy/params.json",
				&proxy_params(0x02),
			);
			fixture.write(
				"deterministicConfig/upgradeGate/params.json",
				&format!(
					r#"{{"creationCode":"0x6080","salt":"0x{}","deployerAddress":"0x{a}","upgradeGateAddress":"0x{a}","proxyDeployerAddress":"0x{a}"}}"#,
					"03".repeat(32),
					a = "ee".repeat(20)
				),
			);
			fixture
		}

		fn root(&self) -> &Path {
			self.dir.path()
		}

		fn write(&self, relative: &str, contents: &str) {
			let path = self.root().join(relative);
			fs::create_dir_all(path.parent().unwrap()).unwrap();
			fs::write(path, contents).unwrap();
		}

		fn store_path(&self, kind: ProxyKind) -> std::path::PathBuf {
			self.root()
				.join("deterministicConfig")
				.join(kind.as_str())
				.join("signatures.json")
		}

		fn read_store(&self, kind: ProxyKind) -> Option<SignatureStore> {
			fs::read(self.store_path(kind))
				.ok()
				.map(|bytes| serde_json::from_slice(&bytes).unwrap())
		}

		fn engine_with(&self, account: Box<dyn AccountInterface>) -> SigningEngine {
			let resolver = ChainConfigResolver::new(
				self.root().join("addresses"),
				self.root().join("chainConfigs"),
				DescriptorFields::default(),
			);
			let params_dir = self.root().join("deterministicConfig");
			let storage = FileStorage::new(params_dir.clone());
			SigningEngine::new(
				resolver,
				params_dir,
				Arc::new(AccountService::new(account)),
				Arc::new(SignatureService::new(Box::new(storage))),
			)
		}

		fn engine(&self) -> SigningEngine {
			self.engine_with(Box::new(local_account()))
		}
	}

	fn proxy_params(salt: u8) -> String {
		format!(
			r#"{{"proxyDeployerAddress":"0x{}","proxySalt":"0x{}","proxyShimSalt":"0x{}","proxyCreationCode":"0x60806040"}}"#,
			"dd".repeat(20),
			format!("{:02x}", salt).repeat(32),
			"ff".repeat(32)
		)
	}

	fn local_account() -> LocalAccount {
		LocalAccount::new(&SecretString::from(ANVIL_KEY)).unwrap()
	}

	struct FailingAccount;

	#[async_trait]
	impl AccountInterface for FailingAccount {
		async fn address(&self) -> Result<Address, AccountError> {
			Ok(Address::ZERO)
		}

		async fn sign_typed_data(
			&self,
			_typed_data: &TypedData,
		) -> Result<Signature, AccountError> {
			Err(AccountError::SigningFailed("backend unavailable".to_string()))
		}
	}

	#[tokio::test]
	async fn test_signs_every_flow() {
		let fixture = Fixture::new();
		fixture.write(
			"addresses/8453.json",
			&format!(
				r#"{{"FACTORY_IMPL":"{}","PREMINTER_IMPL":"{}"}}"#,
				FACTORY_IMPL, PREMINTER_IMPL
			),
		);
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));

		let report = fixture.engine().run(8453).await.unwrap();

		assert_eq!(
			report.states(),
			&[
				RunState::Init,
				RunState::Resolve(ProxyKind::FactoryProxy),
				RunState::Sign(ProxyKind::FactoryProxy),
				RunState::Resolve(ProxyKind::PremintExecutorProxy),
				RunState::Sign(ProxyKind::PremintExecutorProxy),
				RunState::Resolve(ProxyKind::UpgradeGate),
				RunState::Sign(ProxyKind::UpgradeGate),
				RunState::Done,
			]
		);
		assert_eq!(report.signed(), 3);

		for kind in ProxyKind::all() {
			let store = fixture.read_store(kind).unwrap();
			assert_eq!(store.len(), 1);
			assert_eq!(store.get(8453).unwrap().as_str().len(), 132);
		}
	}

	#[tokio::test]
	async fn test_factory_flow_keeps_existing_keys() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));
		fixture.write(
			"deterministicConfig/factoryProxy/signatures.json",
			r#"{"1":"0x01","10":"0x0a"}"#,
		);

		fixture.engine().run(8453).await.unwrap();

		let store = fixture.read_store(ProxyKind::FactoryProxy).unwrap();
		assert_eq!(store.len(), 3);
		assert_eq!(store.get(1).unwrap().as_str(), "0x01");
		assert_eq!(store.get(10).unwrap().as_str(), "0x0a");
		assert_eq!(store.get(8453).unwrap().as_str().len(), 132);

		let raw = fs::read_to_string(fixture.store_path(ProxyKind::FactoryProxy)).unwrap();
		assert!(raw.starts_with("{\n  \"1\": \"0x01\",\n  \"10\": \"0x0a\",\n  \"8453\": \"0x"));
	}

	#[tokio::test]
	async fn test_missing_preminter_is_skipped() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));

		let report = fixture.engine().run(8453).await.unwrap();

		assert_eq!(
			report.outcome(ProxyKind::PremintExecutorProxy),
			Some(&FlowOutcome::Skipped(Miss::Excluded(
				Exclusion::MissingImplementation
			)))
		);
		assert!(report
			.states()
			.contains(&RunState::Skip(ProxyKind::PremintExecutorProxy)));
		assert!(fixture.read_store(ProxyKind::PremintExecutorProxy).is_none());
		assert!(fixture.read_store(ProxyKind::UpgradeGate).is_some());
	}

	#[tokio::test]
	async fn test_missing_upgrade_gate_chain_aborts_without_writes() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/10.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));

		let err = fixture.engine().run(8453).await.unwrap_err();

		assert!(matches!(
			err.source,
			FlowError::Config(ConfigError::ConfigNotFound {
				proxy_kind: ProxyKind::UpgradeGate,
				chain_id: 8453,
			})
		));
		assert_eq!(err.report.states().last(), Some(&RunState::AbortFatal));
		assert_eq!(
			err.report.outcome(ProxyKind::FactoryProxy),
			Some(&FlowOutcome::Skipped(Miss::Excluded(Exclusion::MissingOwner)))
		);
		for kind in ProxyKind::all() {
			assert!(fixture.read_store(kind).is_none());
		}
	}

	#[tokio::test]
	async fn test_partial_outcome_is_reported() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));
		fs::remove_file(
			fixture
				.root()
				.join("deterministicConfig/upgradeGate/params.json"),
		)
		.unwrap();

		let err = fixture.engine().run(8453).await.unwrap_err();

		assert!(matches!(err.source, FlowError::Config(ConfigError::Io(_))));
		assert!(matches!(
			err.report.outcome(ProxyKind::FactoryProxy),
			Some(FlowOutcome::Signed { entries: 1, .. })
		));
		assert!(fixture.read_store(ProxyKind::FactoryProxy).is_some());
		assert!(fixture.read_store(ProxyKind::UpgradeGate).is_none());
	}

	#[tokio::test]
	async fn test_signing_failure_aborts() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));

		let err = fixture
			.engine_with(Box::new(FailingAccount))
			.run(8453)
			.await
			.unwrap_err();

		assert!(matches!(err.source, FlowError::Account(_)));
		assert_eq!(
			err.report.states(),
			&[
				RunState::Init,
				RunState::Resolve(ProxyKind::FactoryProxy),
				RunState::Sign(ProxyKind::FactoryProxy),
				RunState::AbortFatal,
			]
		);
		assert!(fixture.read_store(ProxyKind::FactoryProxy).is_none());
	}

	#[tokio::test]
	async fn test_corrupt_store_aborts() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));
		fixture.write("deterministicConfig/factoryProxy/signatures.json", "not json");

		let err = fixture.engine().run(8453).await.unwrap_err();

		assert!(matches!(
			err.source,
			FlowError::Storage(StorageError::Corrupt { .. })
		));
		let raw = fs::read_to_string(fixture.store_path(ProxyKind::FactoryProxy)).unwrap();
		assert_eq!(raw, "not json");
	}

	#[tokio::test]
	async fn test_runs_are_deterministic() {
		let fixture = Fixture::new();
		fixture.write("addresses/8453.json", &format!(r#"{{"FACTORY_IMPL":"{}"}}"#, FACTORY_IMPL));
		fixture.write("chainConfigs/8453.json", &format!(r#"{{"FACTORY_OWNER":"{}"}}"#, OWNER));

		let engine = fixture.engine();
		let first = engine.run(8453).await.unwrap();
		let before = fs::read(fixture.store_path(ProxyKind::UpgradeGate)).unwrap();
		let second = engine.run(8453).await.unwrap();
		let after = fs::read(fixture.store_path(ProxyKind::UpgradeGate)).unwrap();

		assert_eq!(first, second);
		assert_eq!(before, after);
	}

	#[tokio::test]
	async fn test_field_order_changes_signature() {
		let config = DeterministicProxyConfig {
			proxy_deployer_address: Address::repeat_byte(0xdd),
			proxy_salt: B256::repeat_byte(0x01),
			proxy_shim_salt: B256::repeat_byte(0x02),
			proxy_creation_code: Bytes::from_static(&[0x60, 0x80]),
		};
		let chain = ChainConfig::with_implementation(
			8453,
			Address::repeat_byte(1),
			Address::repeat_byte(2),
		);
		let request = build_create_proxy(&config, &chain).unwrap();

		let mut swapped = request.clone();
		let mut fields = create_proxy_fields();
		fields.swap(0, 1);
		swapped.types.insert("createProxy".to_string(), fields);

		let account = local_account();
		let original = account.sign_typed_data(&request).await.unwrap();
		let reordered = account.sign_typed_data(&swapped).await.unwrap();
		assert_ne!(original, reordered);
	}
}
