//! EIP-712 typed data requests.
//!
//! A [`TypedData`] is the complete payload handed to a signing backend. It
//! serializes to the JSON shape accepted by `eth_signTypedData_v4` minus the
//! implied `EIP712Domain` entry, and computes its own signing digest so that
//! backends holding a raw key can sign it without a JSON round trip.
//!
//! Only flat structs whose members are `address`, `bytes32` or `bytes` are
//! supported, which covers every deployment payload the signer produces.

use crate::utils::eip712::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder};
use crate::ChainId;
use alloy_primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while hashing typed data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypedDataError {
	/// The primary type has no entry in `types`.
	#[error("No type definition for primary type '{0}'")]
	UnknownPrimaryType(String),
	/// A declared member has no value in the message.
	#[error("Field '{field}' of '{type_name}' is missing from the message")]
	MissingField { type_name: String, field: String },
	/// A message value does not match the declared member type.
	#[error("Field '{field}' is declared as '{declared}' but holds a {actual} value")]
	TypeMismatch {
		field: String,
		declared: String,
		actual: &'static str,
	},
	/// The member type is not one this encoder handles.
	#[error("Unsupported member type '{0}'")]
	UnsupportedType(String),
}

/// The signing domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
	pub name: String,
	pub version: String,
	pub chain_id: ChainId,
	pub verifying_contract: Address,
}

impl Eip712Domain {
	/// Returns the domain separator.
	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}

/// One member of a struct definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
	pub name: String,
	#[serde(rename = "type")]
	pub type_name: String,
}

impl TypedField {
	pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			type_name: type_name.into(),
		}
	}
}

/// A message value, serialized as `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
	Address(Address),
	Bytes32(B256),
	Bytes(Bytes),
}

impl TypedValue {
	/// Solidity type name of the value.
	pub fn kind(&self) -> &'static str {
		match self {
			TypedValue::Address(_) => "address",
			TypedValue::Bytes32(_) => "bytes32",
			TypedValue::Bytes(_) => "bytes",
		}
	}

	fn encode_as(
		&self,
		field: &TypedField,
		enc: &mut Eip712AbiEncoder,
	) -> Result<(), TypedDataError> {
		match (field.type_name.as_str(), self) {
			("address", TypedValue::Address(addr)) => enc.push_address(addr),
			("bytes32", TypedValue::Bytes32(word)) => enc.push_b256(word),
			("bytes", TypedValue::Bytes(data)) => enc.push_dynamic(data),
			("address" | "bytes32" | "bytes", value) => {
				return Err(TypedDataError::TypeMismatch {
					field: field.name.clone(),
					declared: field.type_name.clone(),
					actual: value.kind(),
				})
			},
			(other, _) => return Err(TypedDataError::UnsupportedType(other.to_string())),
		}
		Ok(())
	}
}

impl From<Address> for TypedValue {
	fn from(value: Address) -> Self {
		TypedValue::Address(value)
	}
}

impl From<B256> for TypedValue {
	fn from(value: B256) -> Self {
		TypedValue::Bytes32(value)
	}
}

impl From<Bytes> for TypedValue {
	fn from(value: Bytes) -> Self {
		TypedValue::Bytes(value)
	}
}

/// A structured signing request.
///
/// The member order of `types[primary_type]` determines both the type hash and
/// the encoding order, and therefore the signature. `message` is keyed by
/// member name and its order is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
	pub domain: Eip712Domain,
	pub types: BTreeMap<String, Vec<TypedField>>,
	pub primary_type: String,
	pub message: BTreeMap<String, TypedValue>,
}

impl TypedData {
	/// Returns the ordered member list of the primary type.
	pub fn primary_fields(&self) -> Result<&[TypedField], TypedDataError> {
		self.types
			.get(&self.primary_type)
			.map(Vec::as_slice)
			.ok_or_else(|| TypedDataError::UnknownPrimaryType(self.primary_type.clone()))
	}

	/// Returns the encoded type, e.g. `createGenericContract(bytes32 salt,bytes creationCode,bytes initCall)`.
	pub fn encode_type(&self) -> Result<String, TypedDataError> {
		let members = self
			.primary_fields()?
			.iter()
			.map(|f| format!("{} {}", f.type_name, f.name))
			.collect::<Vec<_>>()
			.join(",");
		Ok(format!("{}({})", self.primary_type, members))
	}

	/// Computes hashStruct(message) for the primary type.
	pub fn struct_hash(&self) -> Result<B256, TypedDataError> {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&keccak256(self.encode_type()?.as_bytes()));

		for field in self.primary_fields()? {
			let value =
				self.message
					.get(&field.name)
					.ok_or_else(|| TypedDataError::MissingField {
						type_name: self.primary_type.clone(),
						field: field.name.clone(),
					})?;
			value.encode_as(field, &mut enc)?;
		}

		Ok(keccak256(enc.finish()))
	}

	/// Computes the digest a signer signs: keccak256(0x1901 || domainSeparator || hashStruct).
	pub fn signing_hash(&self) -> Result<B256, TypedDataError> {
		Ok(compute_final_digest(
			&self.domain.separator(),
			&self.struct_hash()?,
		))
	}
}
