//! Confidential-client authentication at the token endpoint:
//! `client_secret_basic` (the `Authorization: Basic` header) and
//! `client_secret_post` (`client_id`/`client_secret` form fields).

use base64::{engine::general_purpose::STANDARD, Engine};

use idplat_types::types::Client;

use crate::prelude::*;

pub struct ClientCredentials {
	pub client_id: String,
	pub client_secret: Option<String>,
}

/// Parses client credentials from the `Authorization` header
/// (`client_secret_basic`) if present, else from form fields
/// (`client_secret_post`).
pub fn from_request(authorization_header: Option<&str>, form_client_id: Option<&str>, form_client_secret: Option<&str>) -> ClResult<ClientCredentials> {
	if let Some(header) = authorization_header {
		if let Some(encoded) = header.strip_prefix("Basic ") {
			let decoded = STANDARD.decode(encoded).map_err(|_| Error::InvalidClient("malformed Basic authorization header".into()))?;
			let decoded = String::from_utf8(decoded).map_err(|_| Error::InvalidClient("malformed Basic authorization header".into()))?;
			let (client_id, client_secret) =
				decoded.split_once(':').ok_or_else(|| Error::InvalidClient("malformed Basic authorization header".into()))?;
			return Ok(ClientCredentials { client_id: client_id.to_string(), client_secret: Some(client_secret.to_string()) });
		}
	}

	let client_id = form_client_id.ok_or_else(|| Error::InvalidClient("client_id is required".into()))?;
	Ok(ClientCredentials { client_id: client_id.to_string(), client_secret: form_client_secret.map(str::to_string) })
}

/// Verifies `credentials` against `client`'s registered secrets. A
/// client with no registered secrets (a public/native client) is
/// authenticated by `client_id` alone.
pub fn verify(client: &Client, credentials: &ClientCredentials) -> ClResult<()> {
	if client.client_secrets.is_empty() {
		return Ok(());
	}
	match &credentials.client_secret {
		Some(secret) if client.client_secrets.iter().any(|s| s == secret) => Ok(()),
		_ => Err(Error::InvalidClient("client authentication failed".into())),
	}
}

// vim: ts=4
