//! Signing accounts for the deterministic deployment signer.
//!
//! This module defines the interface a signing backend implements and the
//! service wrapper the engine talks to. Backends receive a complete EIP-712
//! typed data request and return a 65-byte signature.

use alloy_primitives::Address;
use async_trait::async_trait;
use deployer_types::{ImplementationRegistry, Signature, TypedData};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Failures of a signing account.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The backend could not produce a signature for the request.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// The configured key cannot be parsed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The implementation is misconfigured or unavailable.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// A signing backend holding the deployer key.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address whose key produces the signatures.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs an EIP-712 typed data request.
	///
	/// The same request signed by the same key always yields the same signature.
	async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, AccountError>;
}

/// Builds an account from its `[account.implementations.<name>]` table.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Marker for registries that hand out an [`AccountFactory`].
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Every built-in account implementation as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// The account the engine signs with.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign(&self, typed_data: &TypedData) -> Result<Signature, AccountError> {
		self.implementation.sign_typed_data(typed_data).await
	}
}
