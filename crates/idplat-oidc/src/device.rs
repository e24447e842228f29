//! Device authorization endpoint (`/connect/deviceauthorization`, §4.5
//! device-code grant, §6, RFC 8628): mints a `device_code`/`user_code`
//! pair. The user approves `user_code` out-of-band (e.g. at
//! `verification_uri`); the client polls `/connect/token` with
//! `device_code` until approval lands.

use rand::Rng;
use serde::{Deserialize, Serialize};

use idplat_types::types::{GrantKind, PersistedGrant};
use idplat_types::utils::random_handle;

use crate::client_auth;
use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct DeviceAuthorizationForm {
	pub scope: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeviceAuthorizationResponse {
	pub device_code: String,
	pub user_code: String,
	pub verification_uri: String,
	pub verification_uri_complete: String,
	pub expires_in: i64,
	pub interval: i64,
}

/// A user-facing code drawn from an unambiguous alphabet (no `0`/`O`/`1`/`I`),
/// formatted `XXXX-XXXX` for easy transcription.
fn generate_user_code() -> String {
	const ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ23456789";
	let mut rng = rand::thread_rng();
	let chars: String = (0..8).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
	format!("{}-{}", &chars[0..4], &chars[4..8])
}

pub async fn authorize_device(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: DeviceAuthorizationForm) -> ClResult<DeviceAuthorizationResponse> {
	let credentials = client_auth::from_request(authorization_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
	let client = app.client_store.find_client(tenant_id, &credentials.client_id).await?;
	client_auth::verify(&client, &credentials)?;

	let scopes: Vec<String> = form.scope.map(|s| s.split_whitespace().map(str::to_string).collect()).unwrap_or_default();
	for scope in &scopes {
		if !client.allowed_scopes.iter().any(|s| s == scope) {
			return Err(Error::InvalidScope(scope.clone()));
		}
	}

	let lifetime = app.settings.get_i64(tenant_id, Some(&client.client_id), "oidc.device_code_lifetime_seconds", 600);
	let interval = app.settings.get_i64(tenant_id, Some(&client.client_id), "oidc.device_polling_interval_seconds", 5);
	let now = Timestamp::now();
	let device_code = random_handle()?;
	let user_code = generate_user_code();

	let device_grant = PersistedGrant {
		grant_key: device_code.clone(),
		kind: GrantKind::DeviceCode,
		subject_id: None,
		client_id: client.client_id.clone(),
		tenant_id,
		session_id: None,
		scopes: scopes.iter().cloned().collect(),
		created_at: now,
		expires_at: now.plus_seconds(lifetime),
		serialized_payload: user_code.clone(),
		consumed_at: None,
	};
	app.grant_store.put_grant(device_grant).await?;

	let user_grant = PersistedGrant {
		grant_key: user_code.clone(),
		kind: GrantKind::UserCode,
		subject_id: None,
		client_id: client.client_id.clone(),
		tenant_id,
		session_id: None,
		scopes: scopes.into_iter().collect(),
		created_at: now,
		expires_at: now.plus_seconds(lifetime),
		serialized_payload: device_code.clone(),
		consumed_at: None,
	};
	app.grant_store.put_grant(user_grant).await?;

	let verification_uri = format!("{issuer}/connect/device");
	Ok(DeviceAuthorizationResponse {
		device_code,
		verification_uri_complete: format!("{verification_uri}?user_code={user_code}"),
		verification_uri,
		user_code,
		expires_in: lifetime,
		interval,
	})
}

/// Called once the user approves `user_code` out-of-band (§4.5): binds
/// `subject_id` to both the user-facing and device-facing grant halves
/// so the next `/connect/token` poll succeeds.
pub async fn approve(app: &App, user_code: &str, subject_id: &str, session_id: Option<String>) -> ClResult<()> {
	let mut user_grant = app.grant_store.find_grant(user_code).await?;
	if user_grant.kind != GrantKind::UserCode {
		return Err(Error::InvalidGrant("unknown user_code".into()));
	}
	if user_grant.expires_at.is_past(Timestamp::now()) {
		return Err(Error::ExpiredToken("user_code expired".into()));
	}
	let device_code = user_grant.serialized_payload.clone();
	let mut device_grant = app.grant_store.find_grant(&device_code).await?;

	user_grant.subject_id = Some(subject_id.to_string());
	device_grant.subject_id = Some(subject_id.to_string());
	device_grant.session_id = session_id;

	app.grant_store.put_grant(user_grant).await?;
	app.grant_store.put_grant(device_grant).await?;
	Ok(())
}

// vim: ts=4
