//! Self-signed X.509 certificate issuance: key usage, subject key
//! identifier, and subject alternative names, plus SHA-1/SHA-256
//! certificate thumbprints.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rcgen::{CertificateParams, DistinguishedName, DnType, Ia5String, KeyPair, KeyUsagePurpose, SanType};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

use idplat_types::types::CertificateKeyUsage;

use crate::prelude::*;

pub struct CertRequest<'a> {
	pub common_name: &'a str,
	pub sans: &'a [String],
	pub key_usage: CertificateKeyUsage,
	pub validity_days: u32,
}

pub struct GeneratedCertificate {
	pub der: Vec<u8>,
	pub pem: String,
	pub key_pair_pem: String,
	pub subject_dn: String,
	pub issuer_dn: String,
	pub serial: String,
	pub sha1_thumbprint: String,
	pub sha256_thumbprint: String,
}

pub fn generate_self_signed(req: &CertRequest<'_>) -> ClResult<GeneratedCertificate> {
	let key_pair = KeyPair::generate().map_err(|e| Error::Internal(format!("certificate key generation failed: {e}")))?;

	let mut params = CertificateParams::default();
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, req.common_name);
	params.distinguished_name = dn;
	params.key_usages = key_usage_purposes(req.key_usage);
	params.not_after = validity_to_date(req.validity_days)?;

	if !req.sans.is_empty() {
		let mut sans = Vec::with_capacity(req.sans.len());
		for san in req.sans {
			let ia5 = Ia5String::try_from(san.as_str())
				.map_err(|_| Error::ValidationError(format!("invalid subject alternative name: {san}")))?;
			sans.push(SanType::DnsName(ia5));
		}
		params.subject_alt_names = sans;
	}

	let cert = params
		.self_signed(&key_pair)
		.map_err(|e| Error::Internal(format!("self-signed certificate generation failed: {e}")))?;

	let der = cert.der().to_vec();
	let (subject_dn, issuer_dn, serial) = parse_identity(&der)?;

	Ok(GeneratedCertificate {
		sha1_thumbprint: hex_upper(&Sha1::digest(&der)),
		sha256_thumbprint: URL_SAFE_NO_PAD.encode(Sha256::digest(&der)),
		pem: cert.pem(),
		key_pair_pem: key_pair.serialize_pem(),
		der,
		subject_dn,
		issuer_dn,
		serial,
	})
}

/// Maps the flag-set onto rcgen's `KeyUsagePurpose`. A self-signed
/// platform cert is its own issuer, so `KeyCertSign` is always implied.
fn key_usage_purposes(flags: CertificateKeyUsage) -> Vec<KeyUsagePurpose> {
	let mut out = Vec::new();
	if flags.contains(CertificateKeyUsage::DIGITAL_SIGNATURE) {
		out.push(KeyUsagePurpose::DigitalSignature);
	}
	if flags.contains(CertificateKeyUsage::NON_REPUDIATION) {
		out.push(KeyUsagePurpose::ContentCommitment);
	}
	if flags.contains(CertificateKeyUsage::KEY_ENCIPHERMENT) {
		out.push(KeyUsagePurpose::KeyEncipherment);
	}
	if flags.contains(CertificateKeyUsage::DATA_ENCIPHERMENT) {
		out.push(KeyUsagePurpose::DataEncipherment);
	}
	out.push(KeyUsagePurpose::KeyCertSign);
	out
}

fn hex_upper(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn parse_identity(der: &[u8]) -> ClResult<(String, String, String)> {
	let (_, parsed): (_, X509Certificate<'_>) =
		X509Certificate::from_der(der).map_err(|e| Error::Internal(format!("failed to parse generated certificate: {e}")))?;
	Ok((parsed.subject().to_string(), parsed.issuer().to_string(), parsed.raw_serial_as_string()))
}

/// Converts a validity period in days into a future `OffsetDateTime` for `rcgen`.
fn validity_to_date(days: u32) -> ClResult<time::OffsetDateTime> {
	use std::time::{SystemTime, UNIX_EPOCH};

	let now_secs = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_err(|e| Error::Internal(format!("system time error: {e}")))?
		.as_secs();
	let future_secs = now_secs.saturating_add(u64::from(days) * 86_400);

	time::OffsetDateTime::from_unix_timestamp(i64::try_from(future_secs).unwrap_or(i64::MAX))
		.map_err(|e| Error::Internal(format!("certificate validity date calculation failed: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generates_cert_with_critical_key_usage_and_sans() {
		let req = CertRequest {
			common_name: "idp.example.com",
			sans: &["idp.example.com".into(), "auth.example.com".into()],
			key_usage: CertificateKeyUsage::DIGITAL_SIGNATURE | CertificateKeyUsage::KEY_ENCIPHERMENT,
			validity_days: 365,
		};
		let cert = generate_self_signed(&req).unwrap();
		assert!(cert.pem.contains("BEGIN CERTIFICATE"));
		assert_eq!(cert.sha1_thumbprint.len(), 40);
		assert!(!cert.sha256_thumbprint.contains('='));
	}

	#[test]
	fn thumbprints_are_deterministic_for_same_der() {
		let req = CertRequest {
			common_name: "idp.example.com",
			sans: &[],
			key_usage: CertificateKeyUsage::DIGITAL_SIGNATURE,
			validity_days: 30,
		};
		let cert = generate_self_signed(&req).unwrap();
		let recomputed_sha1 = hex_upper(&Sha1::digest(&cert.der));
		assert_eq!(cert.sha1_thumbprint, recomputed_sha1);
	}
}

// vim: ts=4
