//! Token introspection endpoint (`/connect/introspect`, RFC 7662,
//! §4.5 point 7, §6).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client_auth;
use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct IntrospectionForm {
	pub token: String,
	pub token_type_hint: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntrospectionResponse {
	pub active: bool,
	#[serde(flatten, skip_serializing_if = "Map::is_empty")]
	pub claims: Map<String, Value>,
}

pub async fn introspect(app: &App, tenant_id: Option<TnId>, authorization_header: Option<&str>, form: IntrospectionForm) -> ClResult<IntrospectionResponse> {
	let credentials = client_auth::from_request(authorization_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
	let client = app.client_store.find_client(tenant_id, &credentials.client_id).await?;
	client_auth::verify(&client, &credentials)?;

	match idplat_token::service::introspect_access_token(app, &form.token).await {
		Ok(claims) => Ok(IntrospectionResponse { active: true, claims }),
		Err(_) => Ok(IntrospectionResponse { active: false, claims: Map::new() }),
	}
}

// vim: ts=4
