//! JWKS document assembly (§4.4 "JWKS publication"). Keys still
//! permitted in the document are either active or retired but within
//! the publication grace window past `not_after`; the grace window
//! itself is enforced by `SigningCredentialStore::publishable_keys`,
//! this module only renders whatever it returns into JWK form.

use base64::{engine::general_purpose::STANDARD, Engine};
use pkcs8::DecodePublicKey;
use serde::Serialize;

use crate::prelude::*;

#[derive(Debug, Serialize)]
pub struct Jwk {
	pub kty: &'static str,
	#[serde(rename = "use")]
	pub use_: &'static str,
	pub kid: String,
	pub alg: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub n: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub e: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub crv: Option<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub x: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub y: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub x5t: Option<String>,
	#[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none")]
	pub x5t_s256: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JwkSet {
	pub keys: Vec<Jwk>,
}

/// Renders a key's public half as a JWK. Symmetric keys have no public
/// component and are never published; callers should filter them out
/// before calling this, but passing one through is a programming error
/// rather than a request failure.
pub fn key_to_jwk(key: &SigningKey) -> ClResult<Jwk> {
	let use_ = match key.use_ {
		idplat_types::types::KeyUse::Signing => "sig",
		idplat_types::types::KeyUse::Encryption => "enc",
	};

	let der = STANDARD
		.decode(&key.public_key_data)
		.map_err(|e| Error::Internal(format!("stored public key is not valid base64: {e}")))?;

	let (n, e, crv, x, y) = match key.key_type {
		KeyType::Rsa => {
			let public = rsa::RsaPublicKey::from_public_key_der(&der)
				.map_err(|e| Error::Internal(format!("failed to parse stored RSA public key: {e}")))?;
			use rsa::traits::PublicKeyParts;
			(
				Some(to_base64url_no_pad(&public.n().to_bytes_be())),
				Some(to_base64url_no_pad(&public.e().to_bytes_be())),
				None,
				None,
				None,
			)
		}
		KeyType::Ec => ec_components(&der, &key.algorithm)?,
		KeyType::Symmetric => {
			return Err(Error::Internal("symmetric keys have no public JWK representation".into()));
		}
	};

	Ok(Jwk {
		kty: if matches!(key.key_type, KeyType::Rsa) { "RSA" } else { "EC" },
		use_,
		kid: key.key_id.clone(),
		alg: key.algorithm.clone(),
		n,
		e,
		crv,
		x,
		y,
		x5t: key.x5t_sha1.clone(),
		x5t_s256: key.x5t_sha256.clone(),
	})
}

type EcComponents = (Option<String>, Option<String>, Option<&'static str>, Option<String>, Option<String>);

fn ec_components(der: &[u8], algorithm: &str) -> ClResult<EcComponents> {
	let (crv, x, y) = match algorithm {
		"ES256" => {
			let public = p256::PublicKey::from_public_key_der(der)
				.map_err(|e| Error::Internal(format!("failed to parse stored P-256 public key: {e}")))?;
			let point = public.to_encoded_point(false);
			(
				"P-256",
				to_base64url_no_pad(point.x().ok_or_else(missing_coord)?),
				to_base64url_no_pad(point.y().ok_or_else(missing_coord)?),
			)
		}
		"ES384" => {
			let public = p384::PublicKey::from_public_key_der(der)
				.map_err(|e| Error::Internal(format!("failed to parse stored P-384 public key: {e}")))?;
			let point = public.to_encoded_point(false);
			(
				"P-384",
				to_base64url_no_pad(point.x().ok_or_else(missing_coord)?),
				to_base64url_no_pad(point.y().ok_or_else(missing_coord)?),
			)
		}
		"ES512" => {
			let public = p521::PublicKey::from_public_key_der(der)
				.map_err(|e| Error::Internal(format!("failed to parse stored P-521 public key: {e}")))?;
			let point = public.to_encoded_point(false);
			(
				"P-521",
				to_base64url_no_pad(point.x().ok_or_else(missing_coord)?),
				to_base64url_no_pad(point.y().ok_or_else(missing_coord)?),
			)
		}
		other => return Err(Error::Internal(format!("unsupported EC algorithm for JWK rendering: {other}"))),
	};
	Ok((None, None, Some(crv), Some(x), Some(y)))
}

fn missing_coord() -> Error {
	Error::Internal("EC public key point is missing a coordinate".into())
}

fn to_base64url_no_pad(bytes: &[u8]) -> String {
	idplat_types::utils::to_base64url_no_pad(bytes)
}

/// Builds the published JWKS from the keys a tenant is currently allowed
/// to publish, skipping any symmetric (non-publishable) entries.
pub fn build_jwks(keys: &[SigningKey]) -> ClResult<JwkSet> {
	let mut out = Vec::with_capacity(keys.len());
	for key in keys {
		if matches!(key.key_type, KeyType::Symmetric) {
			continue;
		}
		out.push(key_to_jwk(key)?);
	}
	Ok(JwkSet { keys: out })
}

#[cfg(test)]
mod tests {
	use idplat_types::types::{KeyProvider, KeyUse, Timestamp};

	use super::*;
	use crate::keygen::{generate_rsa, RsaBits};

	fn rsa_signing_key() -> SigningKey {
		let material = generate_rsa(RsaBits::Rsa2048).unwrap();
		SigningKey {
			key_id: "key-1".into(),
			tenant_id: None,
			use_: KeyUse::Signing,
			key_type: KeyType::Rsa,
			algorithm: "RS256".into(),
			public_key_data: material.public_key_der_b64,
			encrypted_private_key_data: None,
			key_vault_uri: None,
			provider: KeyProvider::Local,
			not_before: Timestamp(0),
			not_after: Timestamp(i64::MAX),
			active: true,
			x5t_sha1: None,
			x5t_sha256: None,
			certificate: None,
		}
	}

	#[test]
	fn renders_rsa_jwk_with_modulus_and_exponent() {
		let key = rsa_signing_key();
		let jwk = key_to_jwk(&key).unwrap();
		assert_eq!(jwk.kty, "RSA");
		assert!(jwk.n.is_some());
		assert!(jwk.e.is_some());
		assert!(jwk.crv.is_none());
	}

	#[test]
	fn build_jwks_skips_symmetric_keys() {
		let mut symmetric = rsa_signing_key();
		symmetric.key_type = KeyType::Symmetric;
		symmetric.key_id = "sym-1".into();
		let set = build_jwks(&[rsa_signing_key(), symmetric]).unwrap();
		assert_eq!(set.keys.len(), 1);
	}
}

// vim: ts=4
