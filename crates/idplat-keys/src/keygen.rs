//! Raw key-material generation (§4.4 "Key generation"). Produces
//! base64-encoded DER: RSA private keys as PKCS#1, EC private keys as
//! SEC1, public keys (RSA and EC) as SPKI. Symmetric keys are raw random
//! bytes with no public component.

use base64::{engine::general_purpose::STANDARD, Engine};
use pkcs8::EncodePublicKey;
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::prelude::*;

/// RSA modulus size in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RsaBits {
	Rsa2048,
	Rsa3072,
	Rsa4096,
}

impl RsaBits {
	fn bits(self) -> usize {
		match self {
			RsaBits::Rsa2048 => 2048,
			RsaBits::Rsa3072 => 3072,
			RsaBits::Rsa4096 => 4096,
		}
	}
}

/// EC curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcCurve {
	P256,
	P384,
	P521,
}

/// Symmetric key size in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetricBits {
	Bits256,
	Bits384,
	Bits512,
}

impl SymmetricBits {
	fn bytes(self) -> usize {
		match self {
			SymmetricBits::Bits256 => 32,
			SymmetricBits::Bits384 => 48,
			SymmetricBits::Bits512 => 64,
		}
	}
}

/// Freshly generated key material before it is handed to an encryption
/// service and persisted as a `SigningKey`.
pub struct GeneratedKeyMaterial {
	/// Base64-encoded DER: PKCS#1 for RSA, SEC1 for EC, raw bytes for
	/// symmetric keys. Caller encrypts this before storage.
	pub private_key_der_b64: String,
	/// Base64-encoded SPKI DER; empty for symmetric keys.
	pub public_key_der_b64: String,
}

pub fn generate_rsa(bits: RsaBits) -> ClResult<GeneratedKeyMaterial> {
	let private_key = RsaPrivateKey::new(&mut OsRng, bits.bits())
		.map_err(|e| Error::Internal(format!("rsa key generation failed: {e}")))?;
	let public_key = RsaPublicKey::from(&private_key);

	let private_der = private_key
		.to_pkcs1_der()
		.map_err(|e| Error::Internal(format!("rsa pkcs1 encoding failed: {e}")))?;
	let public_der = public_key
		.to_public_key_der()
		.map_err(|e| Error::Internal(format!("rsa spki encoding failed: {e}")))?;

	Ok(GeneratedKeyMaterial {
		private_key_der_b64: STANDARD.encode(private_der.as_bytes()),
		public_key_der_b64: STANDARD.encode(public_der.as_bytes()),
	})
}

pub fn generate_ec(curve: EcCurve) -> ClResult<GeneratedKeyMaterial> {
	match curve {
		EcCurve::P256 => {
			use p256::SecretKey;
			let secret = SecretKey::random(&mut OsRng);
			let private_der = secret
				.to_sec1_der()
				.map_err(|e| Error::Internal(format!("p256 sec1 encoding failed: {e}")))?;
			let public_der = secret
				.public_key()
				.to_public_key_der()
				.map_err(|e| Error::Internal(format!("p256 spki encoding failed: {e}")))?;
			Ok(GeneratedKeyMaterial {
				private_key_der_b64: STANDARD.encode(private_der.as_bytes()),
				public_key_der_b64: STANDARD.encode(public_der.as_bytes()),
			})
		}
		EcCurve::P384 => {
			use p384::SecretKey;
			let secret = SecretKey::random(&mut OsRng);
			let private_der = secret
				.to_sec1_der()
				.map_err(|e| Error::Internal(format!("p384 sec1 encoding failed: {e}")))?;
			let public_der = secret
				.public_key()
				.to_public_key_der()
				.map_err(|e| Error::Internal(format!("p384 spki encoding failed: {e}")))?;
			Ok(GeneratedKeyMaterial {
				private_key_der_b64: STANDARD.encode(private_der.as_bytes()),
				public_key_der_b64: STANDARD.encode(public_der.as_bytes()),
			})
		}
		EcCurve::P521 => {
			use p521::SecretKey;
			let secret = SecretKey::random(&mut OsRng);
			let private_der = secret
				.to_sec1_der()
				.map_err(|e| Error::Internal(format!("p521 sec1 encoding failed: {e}")))?;
			let public_der = secret
				.public_key()
				.to_public_key_der()
				.map_err(|e| Error::Internal(format!("p521 spki encoding failed: {e}")))?;
			Ok(GeneratedKeyMaterial {
				private_key_der_b64: STANDARD.encode(private_der.as_bytes()),
				public_key_der_b64: STANDARD.encode(public_der.as_bytes()),
			})
		}
	}
}

pub fn generate_symmetric(bits: SymmetricBits) -> GeneratedKeyMaterial {
	let mut bytes = vec![0u8; bits.bytes()];
	OsRng.fill_bytes(&mut bytes);
	GeneratedKeyMaterial { private_key_der_b64: STANDARD.encode(bytes), public_key_der_b64: String::new() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rsa_generation_produces_distinct_keys() {
		let a = generate_rsa(RsaBits::Rsa2048).unwrap();
		let b = generate_rsa(RsaBits::Rsa2048).unwrap();
		assert_ne!(a.private_key_der_b64, b.private_key_der_b64);
		assert!(!a.public_key_der_b64.is_empty());
	}

	#[test]
	fn ec_generation_produces_distinct_keys_per_curve() {
		let p256a = generate_ec(EcCurve::P256).unwrap();
		let p256b = generate_ec(EcCurve::P256).unwrap();
		assert_ne!(p256a.private_key_der_b64, p256b.private_key_der_b64);
		let p384 = generate_ec(EcCurve::P384).unwrap();
		assert!(!p384.private_key_der_b64.is_empty());
		let p521 = generate_ec(EcCurve::P521).unwrap();
		assert!(!p521.private_key_der_b64.is_empty());
	}

	#[test]
	fn symmetric_generation_respects_byte_length() {
		let k = generate_symmetric(SymmetricBits::Bits256);
		let decoded = STANDARD.decode(&k.private_key_der_b64).unwrap();
		assert_eq!(decoded.len(), 32);
		assert!(k.public_key_der_b64.is_empty());
	}
}

// vim: ts=4
