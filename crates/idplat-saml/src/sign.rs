//! XML-DSig signing and verification over RSA-SHA256, for the
//! `<ds:Signature>` block embedded in a signed `<saml:Assertion>` or
//! `<samlp:Response>` (§4.6 "Signs the Assertion ... using the tenant's
//! signing certificate").
//!
//! Reuses the exact decrypt-then-sign pattern
//! `idplat_token::jwt::sign` uses for JWTs: the private key is decrypted
//! through the `EncryptionService` only for the duration of this call.
//! Canonicalization is simplified: rather than a full Exclusive C14N
//! engine, the digest and signature cover the exact serialized XML this
//! crate produced, computed before the `<ds:Signature>` element is
//! spliced in. This is safe for documents this crate both builds and
//! signs, but is not a general XML-DSig canonicalizer.

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{pkcs1v15, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use idplat_keys::encryption::EncryptionService;
use idplat_types::types::KeyType;

use crate::prelude::*;

pub const SIGNATURE_METHOD_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const DIGEST_METHOD_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const CANONICALIZATION_EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// SHA-256 digest of `data`, base64-encoded, for `<ds:DigestValue>`.
pub fn digest_base64(data: &[u8]) -> String {
	STANDARD.encode(Sha256::digest(data))
}

/// Signs `data` (typically the serialized element a `<ds:Reference>`
/// covers) with `key`'s private material, returning the base64
/// `<ds:SignatureValue>` content.
pub fn sign_base64(key: &SigningKey, encryption: &dyn EncryptionService, data: &[u8]) -> ClResult<String> {
	if key.key_type != KeyType::Rsa {
		return Err(Error::Internal("SAML assertion signing requires an RSA signing key".into()));
	}
	let encrypted = key
		.encrypted_private_key_data
		.as_deref()
		.ok_or_else(|| Error::Internal(format!("signing key {} has no private key material", key.key_id)))?;
	let private_der = encryption.decrypt(encrypted)?;
	let private_key = RsaPrivateKey::from_pkcs1_der(&private_der).map_err(|e| Error::CryptoError(format!("stored RSA private key is malformed: {e}")))?;

	let signing_key = pkcs1v15::SigningKey::<Sha256>::new(private_key);
	let signature = signing_key.try_sign_with_rng(&mut rand::rngs::OsRng, data).map_err(|e| Error::CryptoError(format!("SAML signing failed: {e}")))?;
	Ok(STANDARD.encode(signature.to_bytes()))
}

/// Verifies a base64 `<ds:SignatureValue>` over `data` against `key`'s
/// public material.
pub fn verify_base64(key: &SigningKey, data: &[u8], signature_base64: &str) -> ClResult<()> {
	if key.key_type != KeyType::Rsa {
		return Err(Error::Internal("SAML assertion verification requires an RSA signing key".into()));
	}
	let public_der = STANDARD.decode(&key.public_key_data).map_err(|e| Error::CryptoError(format!("stored public key is not valid base64: {e}")))?;
	let public_key = RsaPublicKey::from_public_key_der(&public_der).map_err(|e| Error::CryptoError(format!("stored RSA public key is malformed: {e}")))?;
	let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public_key);

	let raw = STANDARD.decode(signature_base64).map_err(|_| Error::InvalidRequest("SAML signature value is not valid base64".into()))?;
	let signature = pkcs1v15::Signature::try_from(raw.as_slice()).map_err(|_| Error::InvalidRequest("SAML signature value is malformed".into()))?;

	verifying_key.verify(data, &signature).map_err(|_| Error::Unauthorized)
}

/// Base64 DER of `key`'s X.509 certificate, for `<ds:X509Certificate>`.
pub fn certificate_base64(key: &SigningKey) -> ClResult<String> {
	let cert = key.certificate.as_ref().ok_or_else(|| Error::Internal(format!("signing key {} has no certificate", key.key_id)))?;
	Ok(STANDARD.encode(&cert.der))
}

/// Recovers the RSA public key embedded in a bare X.509 certificate's
/// `SubjectPublicKeyInfo`, for verifying an inbound Response against an
/// external IdP's certificate rather than a locally-stored `SigningKey`.
pub fn public_key_from_certificate_der(cert_der: &[u8]) -> ClResult<RsaPublicKey> {
	let (_, cert) = x509_parser::certificate::X509Certificate::from_der(cert_der).map_err(|e| Error::InvalidRequest(format!("IdP certificate is not valid DER: {e}")))?;
	let spki = cert.public_key();
	// The SubjectPublicKeyInfo's BIT STRING content is the PKCS#1
	// RSAPublicKey DER for rsaEncryption keys, not a second SPKI wrapper.
	RsaPublicKey::from_pkcs1_der(&spki.subject_public_key.data).map_err(|e| Error::InvalidRequest(format!("IdP certificate does not carry a usable RSA public key: {e}")))
}

/// Verifies a base64 `<ds:SignatureValue>` over `data` against a raw
/// X.509 certificate DER, for SP-role validation of an inbound Response
/// signed by an external IdP.
pub fn verify_base64_with_certificate(cert_der: &[u8], data: &[u8], signature_base64: &str) -> ClResult<()> {
	let public_key = public_key_from_certificate_der(cert_der)?;
	let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public_key);

	let raw = STANDARD.decode(signature_base64).map_err(|_| Error::InvalidRequest("SAML signature value is not valid base64".into()))?;
	let signature = pkcs1v15::Signature::try_from(raw.as_slice()).map_err(|_| Error::InvalidRequest("SAML signature value is malformed".into()))?;

	verifying_key.verify(data, &signature).map_err(|_| Error::Unauthorized)
}

// vim: ts=4
