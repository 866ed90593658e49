//! Generic EIP-712 hashing primitives.
//!
//! These helpers provide:
//! - Domain separator computation for the four-field domain
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static words used in struct hashing

use alloy_primitives::{keccak256, Address, B256, U256};

/// Type string of the signing domain. Every request carries all four fields.
pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Compute the domain separator:
/// keccak256(abi.encode(typeHash, nameHash, versionHash, chainId, verifyingContract)).
pub fn compute_domain_hash(
	name: &str,
	version: &str,
	chain_id: u64,
	verifying_contract: &Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_b256(&keccak256(name.as_bytes()));
	enc.push_b256(&keccak256(version.as_bytes()));
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for the 32-byte words of an EIP-712 struct encoding.
#[derive(Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	/// Dynamic `bytes` and `string` members are encoded as the hash of their contents.
	pub fn push_dynamic(&mut self, data: &[u8]) {
		self.push_b256(&keccak256(data));
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, b256};

	#[test]
	fn test_domain_hash_matches_reference_example() {
		// "Ether Mail" domain from the EIP-712 reference example.
		let separator = compute_domain_hash(
			"Ether Mail",
			"1",
			1,
			&address!("cccccccccccccccccccccccccccccccccccccccc"),
		);
		assert_eq!(
			separator,
			b256!("f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f")
		);
	}

	#[test]
	fn test_address_is_left_padded() {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_address(&Address::repeat_byte(0x11));
		let word = enc.finish();
		assert_eq!(word.len(), 32);
		assert!(word[..12].iter().all(|b| *b == 0));
		assert!(word[12..].iter().all(|b| *b == 0x11));
	}

	#[test]
	fn test_final_digest_depends_on_both_hashes() {
		let a = B256::repeat_byte(1);
		let b = B256::repeat_byte(2);
		assert_ne!(compute_final_digest(&a, &b), compute_final_digest(&b, &a));
	}
}
