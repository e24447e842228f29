//! Scheduled key rotation: creates a successor key ahead of an active
//! key's `not_after`, scheduled via the core `Scheduler<App>` (§4.4).
//! Covers the platform-wide default signing algorithms; a tenant that
//! provisions its own signing keys is responsible for rotating them
//! through the same `generate_and_store` entry point, typically from an
//! admin action rather than this sweep.

use std::sync::Arc;

use async_trait::async_trait;

use idplat_core::scheduler::{Task, TaskId};

use crate::cert::{self, CertRequest};
use crate::encryption::EncryptionService;
use crate::keygen::{EcCurve, RsaBits};
use crate::provider::{KeyRequest, ProviderRegistry};
use crate::prelude::*;

/// `(alg, key_type)` pairs the rotation sweep keeps alive at the
/// platform scope.
const ROTATION_ALGORITHMS: &[(&str, KeyType)] = &[("RS256", KeyType::Rsa), ("ES256", KeyType::Ec)];

#[derive(Debug)]
pub struct KeyRotationTask;

impl KeyRotationTask {
	pub fn new() -> Arc<Self> {
		Arc::new(Self)
	}
}

#[async_trait]
impl Task<App> for KeyRotationTask {
	fn kind() -> &'static str
	where
		Self: Sized,
	{
		"key_rotation"
	}

	fn build(_id: TaskId, _context: &str) -> ClResult<Arc<dyn Task<App>>>
	where
		Self: Sized,
	{
		Ok(KeyRotationTask::new())
	}

	fn serialize(&self) -> String {
		String::new()
	}

	fn kind_of(&self) -> &'static str {
		"key_rotation"
	}

	async fn run(&self, app: &App) -> ClResult<()> {
		let lead_seconds = app.settings.get_i64(None, None, "keys.rotation_lead_seconds", 14 * 24 * 3600);
		let now = Timestamp::now();

		for (algorithm, key_type) in ROTATION_ALGORITHMS {
			let active = match app.signing_store.active_key(None, algorithm).await {
				Ok(key) => key,
				Err(Error::NoSigningCredentials) => {
					generate_and_store(app, None, algorithm, *key_type, None).await?;
					continue;
				}
				Err(e) => return Err(e),
			};

			if active.not_after.0 - now.0 > lead_seconds {
				continue;
			}

			info!("rotating signing key {} ({algorithm}) ahead of expiry", active.key_id);
			generate_and_store(app, None, algorithm, *key_type, Some(&active.key_id)).await?;
		}

		Ok(())
	}
}

/// Generates a fresh key of `key_type`/`algorithm`, encrypts its private
/// half, optionally reissues the self-signed certificate the retiring
/// key carried, and persists it — atomically retiring `retire_key_id`
/// when given.
async fn generate_and_store(
	app: &App,
	tenant_id: Option<TnId>,
	algorithm: &str,
	key_type: KeyType,
	retire_key_id: Option<&str>,
) -> ClResult<()> {
	let providers = app.ext::<Arc<ProviderRegistry>>()?;
	let encryption = app.ext::<Arc<dyn EncryptionService>>()?;
	let validity_days = app.settings.get_i64(tenant_id, None, "keys.validity_days", 90);

	let provider = providers.default_provider();
	let request = match key_type {
		KeyType::Rsa => KeyRequest::Rsa(RsaBits::Rsa2048),
		KeyType::Ec => KeyRequest::Ec(EcCurve::P256),
		KeyType::Symmetric => {
			return Err(Error::Internal("key rotation sweep does not manage symmetric keys".into()));
		}
	};
	let material = providers.generate(provider, &request)?;

	let private_der =
		base64_decode(&material.private_key_der_b64).map_err(|e| Error::Internal(format!("generated key encoding error: {e}")))?;
	let encrypted_private_key_data = Some(encryption.encrypt(&private_der)?);

	let retiring_certificate = match retire_key_id {
		Some(id) => app.signing_store.find_key(id).await.ok().and_then(|k| k.certificate),
		None => None,
	};

	let certificate = match retiring_certificate {
		Some(old_cert) => {
			let generated = cert::generate_self_signed(&CertRequest {
				common_name: &old_cert.subject_dn,
				sans: &old_cert.sans,
				key_usage: old_cert.key_usage,
				validity_days: u32::try_from(validity_days).unwrap_or(90),
			})?;
			Some(CertificateMaterial {
				subject_dn: generated.subject_dn,
				issuer_dn: generated.issuer_dn,
				serial: generated.serial,
				sha1_thumbprint: generated.sha1_thumbprint,
				sha256_thumbprint: generated.sha256_thumbprint,
				sans: old_cert.sans,
				key_usage: old_cert.key_usage,
				der: generated.der,
			})
		}
		None => None,
	};

	let key_id = idplat_types::utils::random_handle()?;
	let not_before = Timestamp::now();
	let not_after = not_before.plus_seconds(validity_days * 86_400);

	let new_key = SigningKey {
		key_id,
		tenant_id,
		use_: KeyUse::Signing,
		key_type,
		algorithm: algorithm.to_string(),
		public_key_data: material.public_key_der_b64,
		encrypted_private_key_data,
		key_vault_uri: None,
		provider,
		not_before,
		not_after,
		active: true,
		x5t_sha1: certificate.as_ref().map(|c| c.sha1_thumbprint.clone()),
		x5t_sha256: certificate.as_ref().map(|c| c.sha256_thumbprint.clone()),
		certificate,
	};

	match retire_key_id {
		Some(retire_id) => app.signing_store.rotate(tenant_id, new_key, retire_id).await,
		None => app.signing_store.put_key(new_key).await,
	}
}

fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
	use base64::{engine::general_purpose::STANDARD, Engine};
	STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rotation_algorithm_table_has_no_duplicates() {
		let mut seen = std::collections::HashSet::new();
		for (alg, _) in ROTATION_ALGORITHMS {
			assert!(seen.insert(*alg));
		}
	}
}

// vim: ts=4
