//! Local private key account.
//!
//! Signs with a secp256k1 key held in process memory. The key is read from
//! configuration, usually through `${SIGNER_PRIVATE_KEY}` substitution.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use deployer_types::{ImplementationRegistry, SecretString, Signature, TypedData};
use serde::Deserialize;

/// Account backed by an in-memory private key.
pub struct LocalAccount {
	signer: PrivateKeySigner,
}

impl LocalAccount {
	/// Parses a hex private key, with or without `0x` prefix.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key
			.expose_secret()
			.trim()
			.parse()
			.map_err(|e| AccountError::InvalidKey(format!("{}", e)))?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, AccountError> {
		let hash = typed_data
			.signing_hash()
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		let signature = self
			.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		tracing::debug!(
			signer = %self.signer.address(),
			primary_type = %typed_data.primary_type,
			digest = %hash,
			"Signed typed data"
		);
		Ok(Signature::from(signature))
	}
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LocalAccountConfig {
	private_key: SecretString,
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex encoded secp256k1 key (required)
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	let config: LocalAccountConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| AccountError::Implementation(e.message().to_string()))?;
	if config.private_key.is_empty() {
		return Err(AccountError::InvalidKey(
			"private_key must not be empty".to_string(),
		));
	}
	Ok(Box::new(LocalAccount::new(&config.private_key)?))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
