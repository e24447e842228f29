//! Utility functions: opaque handle generation, base64url helpers, and
//! the left-most-half hashing rule used for `at_hash`/`c_hash` (§4.3,
//! §8 round-trip laws).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngExt;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::prelude::*;

/// Length (bytes, before base64url-encoding) of generated opaque grant
/// handles and challenge tokens. §5 requires refresh-token handles to be
/// "base64url of ≥32 random bytes"; reused for codes and reference-token
/// handles as well.
pub const HANDLE_BYTES: usize = 32;

/// Generate a cryptographically random opaque handle suitable for
/// authorization codes, refresh tokens, and reference-token ids.
pub fn random_handle() -> ClResult<String> {
	let mut rng = rand::rng();
	let mut bytes = [0u8; HANDLE_BYTES];
	rng.fill_bytes(&mut bytes);
	Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn to_base64url_no_pad(bytes: &[u8]) -> String {
	URL_SAFE_NO_PAD.encode(bytes)
}

pub fn from_base64url_no_pad(s: &str) -> ClResult<Vec<u8>> {
	URL_SAFE_NO_PAD.decode(s).map_err(|_| Error::Parse)
}

/// Left-most-half hashing rule for `at_hash`/`c_hash` (§4.3, §8 invariant
/// 3): hash the input with the algorithm matching the signing algorithm,
/// take the left half of the digest, base64url-encode without padding.
pub fn left_half_hash(alg: &str, input: &[u8]) -> ClResult<String> {
	let digest: Vec<u8> = if alg.ends_with("384") {
		Sha384::digest(input).to_vec()
	} else if alg.ends_with("512") {
		Sha512::digest(input).to_vec()
	} else {
		Sha256::digest(input).to_vec()
	};
	let half = &digest[..digest.len() / 2];
	Ok(to_base64url_no_pad(half))
}

/// Decode a JWT payload without verifying the signature.
///
/// WARNING: This MUST always be followed by proper signature verification
/// (used only to peek at routing info such as `kid` before full decode).
pub fn decode_jwt_no_verify<T: DeserializeOwned>(jwt: &str) -> ClResult<T> {
	let mut parts = jwt.splitn(3, '.');
	let _header = parts.next().ok_or(Error::Parse)?;
	let payload = parts.next().ok_or(Error::Parse)?;
	let _sig = parts.next().ok_or(Error::Parse)?;
	let payload = URL_SAFE_NO_PAD.decode(payload.as_bytes()).map_err(|_| Error::Parse)?;
	let payload: T = serde_json::from_slice(&payload).map_err(|_| Error::Parse)?;
	Ok(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn base64url_no_pad_has_no_reserved_chars() {
		let encoded = to_base64url_no_pad(&[0xff, 0xfe, 0xfd, 0x00, 0x01]);
		assert!(!encoded.contains('+'));
		assert!(!encoded.contains('/'));
		assert!(!encoded.contains('='));
		let decoded = from_base64url_no_pad(&encoded).unwrap();
		assert_eq!(decoded, vec![0xff, 0xfe, 0xfd, 0x00, 0x01]);
	}

	#[test]
	fn random_handle_is_unique_and_sized() {
		let a = random_handle().unwrap();
		let b = random_handle().unwrap();
		assert_ne!(a, b);
		assert!(a.len() >= 40);
	}

	#[test]
	fn left_half_hash_is_deterministic() {
		let a = left_half_hash("RS256", b"access-token-value").unwrap();
		let b = left_half_hash("RS256", b"access-token-value").unwrap();
		assert_eq!(a, b);
		assert!(!a.contains('='));
	}
}

// vim: ts=4
