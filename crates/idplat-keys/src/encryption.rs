//! The private-key encryption service contract: given plaintext bytes,
//! return a self-contained opaque string the same service can later
//! reverse. Key management of the encryption key itself is out of
//! scope; `LocalEncryptionService` holds its master key in memory for
//! the life of the process and is suited to single-node deployments.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};

use crate::prelude::*;

const NONCE_LEN: usize = 12;

pub trait EncryptionService: Send + Sync {
	/// Encrypts plaintext bytes, returning a self-contained opaque string.
	fn encrypt(&self, plaintext: &[u8]) -> ClResult<String>;
	/// Reverses `encrypt`. Fails with `Error::KeyDecryptFailed` on a
	/// tampered or foreign ciphertext.
	fn decrypt(&self, opaque: &str) -> ClResult<Vec<u8>>;
}

/// AES-256-GCM with a random 96-bit nonce prepended to the ciphertext,
/// the whole thing base64-encoded. The master key never leaves this
/// process; it is supplied once at startup.
pub struct LocalEncryptionService {
	cipher: Aes256Gcm,
}

impl LocalEncryptionService {
	pub fn new(master_key: &[u8; 32]) -> Self {
		Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master_key)) }
	}

	/// Loads the master key from `master_key_b64` (base64, 32 bytes decoded).
	pub fn from_base64(master_key_b64: &str) -> ClResult<Self> {
		let raw = STANDARD
			.decode(master_key_b64)
			.map_err(|_| Error::ConfigError("key encryption master key is not valid base64".into()))?;
		let key: [u8; 32] = raw
			.try_into()
			.map_err(|_| Error::ConfigError("key encryption master key must be exactly 32 bytes".into()))?;
		Ok(Self::new(&key))
	}
}

impl EncryptionService for LocalEncryptionService {
	fn encrypt(&self, plaintext: &[u8]) -> ClResult<String> {
		let mut nonce_bytes = [0u8; NONCE_LEN];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = self
			.cipher
			.encrypt(nonce, Payload { msg: plaintext, aad: b"" })
			.map_err(|_| Error::Internal("key material encryption failed".into()))?;

		let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
		out.extend_from_slice(&nonce_bytes);
		out.extend_from_slice(&ciphertext);
		Ok(STANDARD.encode(out))
	}

	fn decrypt(&self, opaque: &str) -> ClResult<Vec<u8>> {
		let raw = STANDARD.decode(opaque).map_err(|_| Error::KeyDecryptFailed)?;
		if raw.len() < NONCE_LEN {
			return Err(Error::KeyDecryptFailed);
		}
		let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
		let nonce = Nonce::from_slice(nonce_bytes);
		self.cipher
			.decrypt(nonce, Payload { msg: ciphertext, aad: b"" })
			.map_err(|_| Error::KeyDecryptFailed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn service() -> LocalEncryptionService {
		LocalEncryptionService::new(&[7u8; 32])
	}

	#[test]
	fn round_trips_plaintext() {
		let svc = service();
		let opaque = svc.encrypt(b"super secret private key bytes").unwrap();
		let back = svc.decrypt(&opaque).unwrap();
		assert_eq!(back, b"super secret private key bytes");
	}

	#[test]
	fn rejects_tampered_opaque_string() {
		let svc = service();
		let mut opaque = svc.encrypt(b"private key material").unwrap();
		opaque.push('A');
		assert!(matches!(svc.decrypt(&opaque), Err(Error::KeyDecryptFailed)));
	}

	#[test]
	fn distinct_ciphertexts_for_same_plaintext() {
		let svc = service();
		let a = svc.encrypt(b"same input").unwrap();
		let b = svc.encrypt(b"same input").unwrap();
		assert_ne!(a, b);
	}
}

// vim: ts=4
