//! EIP-712 signing requests for the deterministic proxy deployer.
//!
//! Both request types share one domain, scoped to the chain being signed for
//! and verified by the proxy deployer contract. Member order and type strings
//! are fixed: the deployer contract hashes them in exactly this order.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall};
use deployer_types::{
	ChainConfig, ChainId, DeterministicProxyConfig, Eip712Domain, GenericDeployConfig, TypedData,
	TypedField, TypedValue,
};
use std::collections::BTreeMap;
use thiserror::Error;

pub const DOMAIN_NAME: &str = "DeterministicProxyDeployer";
pub const DOMAIN_VERSION: &str = "1";

pub const CREATE_PROXY_TYPE: &str = "createProxy";
pub const CREATE_GENERIC_CONTRACT_TYPE: &str = "createGenericContract";

sol! {
	interface IUpgradeGate {
		function initialize(address owner) external;
	}
}

/// Errors raised while building a signing request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
	#[error("Chain {chain_id} has no implementation address")]
	MissingImplementationAddress { chain_id: ChainId },
}

/// Member list of `createProxy`.
pub fn create_proxy_fields() -> Vec<TypedField> {
	vec![
		TypedField::new("proxyShimSalt", "bytes32"),
		TypedField::new("proxySalt", "bytes32"),
		TypedField::new("proxyCreationCode", "bytes"),
		TypedField::new("implementationAddress", "address"),
		TypedField::new("owner", "address"),
	]
}

/// Member list of `createGenericContract`.
pub fn create_generic_contract_fields() -> Vec<TypedField> {
	vec![
		TypedField::new("salt", "bytes32"),
		TypedField::new("creationCode", "bytes"),
		TypedField::new("initCall", "bytes"),
	]
}

fn domain(chain_id: ChainId, verifying_contract: Address) -> Eip712Domain {
	Eip712Domain {
		name: DOMAIN_NAME.to_string(),
		version: DOMAIN_VERSION.to_string(),
		chain_id,
		verifying_contract,
	}
}

fn typed_data(
	domain: Eip712Domain,
	primary_type: &str,
	fields: Vec<TypedField>,
	message: BTreeMap<String, TypedValue>,
) -> TypedData {
	let mut types = BTreeMap::new();
	types.insert(primary_type.to_string(), fields);
	TypedData {
		domain,
		types,
		primary_type: primary_type.to_string(),
		message,
	}
}

/// Builds the `createProxy` request for one chain.
///
/// The chain id, owner and implementation come from `chain`; salts, creation
/// code and verifying contract come from the shared `config`.
pub fn build_create_proxy(
	config: &DeterministicProxyConfig,
	chain: &ChainConfig,
) -> Result<TypedData, PayloadError> {
	let implementation = chain
		.implementation_address
		.ok_or(PayloadError::MissingImplementationAddress {
			chain_id: chain.chain_id,
		})?;

	let message: BTreeMap<String, TypedValue> = BTreeMap::from([
		("proxyShimSalt".to_string(), config.proxy_shim_salt.into()),
		("proxySalt".to_string(), config.proxy_salt.into()),
		(
			"proxyCreationCode".to_string(),
			config.proxy_creation_code.clone().into(),
		),
		("implementationAddress".to_string(), implementation.into()),
		("owner".to_string(), chain.owner.into()),
	]);

	Ok(typed_data(
		domain(chain.chain_id, config.proxy_deployer_address),
		CREATE_PROXY_TYPE,
		create_proxy_fields(),
		message,
	))
}

/// Builds the `createGenericContract` request for one chain.
///
/// `init_call` is passed through as opaque calldata.
pub fn build_create_generic_contract(
	config: &GenericDeployConfig,
	chain: &ChainConfig,
	init_call: Bytes,
) -> TypedData {
	let message: BTreeMap<String, TypedValue> = BTreeMap::from([
		("salt".to_string(), config.salt.into()),
		("creationCode".to_string(), config.creation_code.clone().into()),
		("initCall".to_string(), init_call.into()),
	]);

	typed_data(
		domain(chain.chain_id, config.proxy_deployer_address),
		CREATE_GENERIC_CONTRACT_TYPE,
		create_generic_contract_fields(),
		message,
	)
}

/// ABI-encodes `initialize(address owner)`.
pub fn encode_initialize_call(owner: Address) -> Bytes {
	IUpgradeGate::initializeCall { owner }.abi_encode().into()
}
