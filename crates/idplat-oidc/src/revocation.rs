//! Revocation endpoint (`/connect/revocation`, RFC 7009, §4.5 point 6,
//! §6): revokes a refresh or access token, cascading to a refresh
//! token's family per [`idplat_token::service::revoke`]. Per RFC 7009
//! §2.2, an unknown token is not an error — the endpoint always
//! answers 200 once the client is authenticated.

use serde::Deserialize;

use crate::client_auth;
use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct RevocationForm {
	pub token: String,
	pub token_type_hint: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

pub async fn revoke(app: &App, tenant_id: Option<TnId>, authorization_header: Option<&str>, form: RevocationForm) -> ClResult<()> {
	let credentials = client_auth::from_request(authorization_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
	let client = app.client_store.find_client(tenant_id, &credentials.client_id).await?;
	client_auth::verify(&client, &credentials)?;

	match idplat_token::service::revoke(app, &form.token, Some(&client.client_id), tenant_id).await {
		Ok(()) | Err(Error::NotFound) => Ok(()),
		Err(err) => Err(err),
	}
}

// vim: ts=4
