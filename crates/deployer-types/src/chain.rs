//! Chain-scoped configuration records.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Identifier of a target network. Positive by construction at the process boundary.
pub type ChainId = u64;

/// Configuration resolved for a single chain.
///
/// `implementation_address` is only populated by the implementation flavor of
/// resolution (factory and preminter proxies). Upgrade-gate records carry the
/// owner alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
	pub chain_id: ChainId,
	pub owner: Address,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub implementation_address: Option<Address>,
}

impl ChainConfig {
	/// Creates a record for the owner flavor, without an implementation address.
	pub fn with_owner(chain_id: ChainId, owner: Address) -> Self {
		Self {
			chain_id,
			owner,
			implementation_address: None,
		}
	}

	/// Creates a record for the implementation flavor.
	pub fn with_implementation(chain_id: ChainId, owner: Address, implementation: Address) -> Self {
		Self {
			chain_id,
			owner,
			implementation_address: Some(implementation),
		}
	}
}
