//! Secure string type for handling the signer's private key.
//!
//! `SecretString` zeroes its buffer on drop and never prints its contents in
//! logs or debug output.

use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

/// A string that is zeroed on drop and redacted when formatted.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret.
	///
	/// # Security Warning
	/// Callers must not log or persist the returned value.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString(***REDACTED***)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "***REDACTED***")
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_formatting_is_redacted() {
		let secret = SecretString::from("0xdeadbeef");
		assert_eq!(format!("{:?}", secret), "SecretString(***REDACTED***)");
		assert_eq!(format!("{}", secret), "***REDACTED***");
	}

	#[test]
	fn test_expose() {
		let secret = SecretString::from("0xdeadbeef");
		assert_eq!(secret.expose_secret(), "0xdeadbeef");
		assert!(!secret.is_empty());
	}

	#[test]
	fn test_deserialize() {
		#[derive(Deserialize)]
		struct Account {
			private_key: SecretString,
		}
		let account: Account = serde_json::from_str(r#"{"private_key":"0x01"}"#).unwrap();
		assert_eq!(account.private_key.expose_secret(), "0x01");
	}
}
