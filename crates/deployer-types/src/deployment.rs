//! Proxy kinds and their deployment parameters.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment targets handled by the signer.
///
/// Each kind owns a directory under the deterministic config root holding its
/// `params.json` and `signatures.json`. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProxyKind {
	/// The ERC-1155 factory proxy.
	FactoryProxy,
	/// The premint executor proxy.
	PremintExecutorProxy,
	/// The upgrade gate, deployed as a generic contract.
	UpgradeGate,
}

/// Which implementation address an address descriptor must carry for a proxy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplementationKind {
	Factory,
	Preminter,
}

/// What a flow does when the requested chain has no resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissPolicy {
	/// Log and continue with the next flow.
	Skip,
	/// Fail the run and abort the remaining flows.
	Abort,
}

impl ProxyKind {
	/// Returns the directory name used for this proxy kind.
	pub fn as_str(&self) -> &'static str {
		match self {
			ProxyKind::FactoryProxy => "factoryProxy",
			ProxyKind::PremintExecutorProxy => "premintExecutorProxy",
			ProxyKind::UpgradeGate => "upgradeGate",
		}
	}

	/// Returns an iterator over all proxy kinds, in execution order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::FactoryProxy,
			Self::PremintExecutorProxy,
			Self::UpgradeGate,
		]
		.into_iter()
	}

	/// The implementation address this kind is resolved against, if any.
	///
	/// `None` means the kind resolves straight from chain descriptors and is
	/// signed as a generic contract deployment.
	pub fn implementation(&self) -> Option<ImplementationKind> {
		match self {
			ProxyKind::FactoryProxy => Some(ImplementationKind::Factory),
			ProxyKind::PremintExecutorProxy => Some(ImplementationKind::Preminter),
			ProxyKind::UpgradeGate => None,
		}
	}

	/// Not every chain has every implementation deployed, so implementation
	/// kinds skip on a miss. Every chain must have an upgrade gate.
	pub fn miss_policy(&self) -> MissPolicy {
		match self.implementation() {
			Some(_) => MissPolicy::Skip,
			None => MissPolicy::Abort,
		}
	}
}

impl fmt::Display for ProxyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProxyKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"factoryProxy" => Ok(Self::FactoryProxy),
			"premintExecutorProxy" => Ok(Self::PremintExecutorProxy),
			"upgradeGate" => Ok(Self::UpgradeGate),
			other => Err(format!("Unknown proxy kind: {}", other)),
		}
	}
}

/// Parameters shared by every chain for a deterministic proxy deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicProxyConfig {
	pub proxy_deployer_address: Address,
	pub proxy_salt: B256,
	pub proxy_shim_salt: B256,
	pub proxy_creation_code: Bytes,
}

/// Parameters shared by every chain for a generic contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericDeployConfig {
	pub creation_code: Bytes,
	pub salt: B256,
	pub deployer_address: Address,
	pub upgrade_gate_address: Address,
	pub proxy_deployer_address: Address,
}
