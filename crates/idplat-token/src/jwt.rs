//! JWT signing over a `SigningKey`: resolves the jsonwebtoken algorithm
//! from the key's recorded algorithm name, decrypts the private key
//! material, and signs. Never logs the resulting compact serialization.

use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use idplat_keys::encryption::EncryptionService;
use idplat_types::types::KeyType;

use crate::prelude::*;

pub fn parse_algorithm(alg: &str) -> ClResult<Algorithm> {
	match alg {
		"RS256" => Ok(Algorithm::RS256),
		"RS384" => Ok(Algorithm::RS384),
		"RS512" => Ok(Algorithm::RS512),
		"ES256" => Ok(Algorithm::ES256),
		"ES384" => Ok(Algorithm::ES384),
		"HS256" => Ok(Algorithm::HS256),
		"HS384" => Ok(Algorithm::HS384),
		"HS512" => Ok(Algorithm::HS512),
		other => Err(Error::Internal(format!("unsupported signing algorithm: {other}"))),
	}
}

/// Signs `claims` with `key`, producing a compact JWT whose header
/// carries `kid` and `typ`. `key.encrypted_private_key_data` is
/// decrypted through `encryption` for the duration of this call only.
pub fn sign(key: &SigningKey, typ: &str, claims: &Map<String, Value>, encryption: &dyn EncryptionService) -> ClResult<String> {
	let algorithm = parse_algorithm(&key.algorithm)?;

	let encrypted = key
		.encrypted_private_key_data
		.as_deref()
		.ok_or_else(|| Error::Internal(format!("signing key {} has no private key material", key.key_id)))?;
	let private_der = encryption.decrypt(encrypted)?;

	let encoding_key = match key.key_type {
		KeyType::Rsa => EncodingKey::from_rsa_der(&private_der),
		KeyType::Ec => EncodingKey::from_ec_der(&private_der),
		KeyType::Symmetric => EncodingKey::from_secret(&private_der),
	};

	let mut header = Header::new(algorithm);
	header.kid = Some(key.key_id.clone());
	header.typ = Some(typ.to_string());

	jsonwebtoken::encode(&header, claims, &encoding_key).map_err(|e| Error::Internal(format!("token signing failed: {e}")))
}

/// Returns the `kid` from a compact JWT's header without verifying the
/// signature, so callers can look up the right `SigningKey` first.
pub fn peek_kid(token: &str) -> ClResult<String> {
	jsonwebtoken::decode_header(token).ok().and_then(|h| h.kid).ok_or(Error::Parse)
}

/// Verifies `token` against `key` and returns its claims as a JSON map.
/// Rejects anything but the algorithm recorded on `key` (no algorithm
/// confusion across the RS*/ES*/HS* families).
pub fn verify(key: &SigningKey, token: &str) -> ClResult<Map<String, Value>> {
	let algorithm = parse_algorithm(&key.algorithm)?;

	let public_der = STANDARD
		.decode(&key.public_key_data)
		.map_err(|e| Error::Internal(format!("stored public key is not valid base64: {e}")))?;

	let decoding_key = match key.key_type {
		KeyType::Rsa => DecodingKey::from_rsa_der(&public_der),
		KeyType::Ec => DecodingKey::from_ec_der(&public_der),
		KeyType::Symmetric => return Err(Error::Internal("symmetric keys cannot verify via the public path".into())),
	};

	let mut validation = Validation::new(algorithm);
	validation.validate_exp = true;
	validation.set_audience::<str>(&[]);
	validation.validate_aud = false;

	let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
		debug!("token verification failed: {e}");
		Error::Unauthorized
	})?;
	Ok(data.claims)
}

// vim: ts=4
