//! Common types module for the deterministic deployment signer.
//!
//! This module defines the core data types shared by every crate in the
//! workspace: chain-scoped configuration records, the per-proxy deployment
//! parameters, EIP-712 typed data and the persisted signature store.

/// Chain identifiers and chain-scoped configuration records.
pub mod chain;
/// Proxy kinds and their immutable deployment parameters.
pub mod deployment;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for private keys.
pub mod secret_string;
/// Signatures and the per-proxy signature store.
pub mod signature;
/// EIP-712 typed data requests handed to the signing backend.
pub mod typed_data;
/// Hashing and formatting helpers.
pub mod utils;

pub use chain::{ChainConfig, ChainId};
pub use deployment::{
	DeterministicProxyConfig, GenericDeployConfig, ImplementationKind, MissPolicy, ProxyKind,
};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use signature::{Signature, SignatureStore};
pub use typed_data::{Eip712Domain, TypedData, TypedDataError, TypedField, TypedValue};
pub use utils::truncate_hex;
