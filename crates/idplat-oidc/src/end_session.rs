//! End-session endpoint (`/connect/endsession`, §4.5 point 8, §6):
//! validates `id_token_hint`'s audience, verifies the requested
//! post-logout redirect against the client's registered list, and
//! terminates the subject's session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use idplat_types::utils::decode_jwt_no_verify;

use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct EndSessionRequest {
	pub id_token_hint: Option<String>,
	pub post_logout_redirect_uri: Option<String>,
	pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EndSessionOutcome {
	pub redirect_uri: Option<String>,
	pub state: Option<String>,
}

#[derive(Deserialize)]
struct IdTokenClaims {
	aud: Value,
	sid: Option<String>,
}

fn audiences(aud: &Value) -> Vec<&str> {
	match aud {
		Value::String(s) => vec![s.as_str()],
		Value::Array(values) => values.iter().filter_map(Value::as_str).collect(),
		_ => vec![],
	}
}

pub async fn end_session(app: &App, tenant_id: Option<TnId>, req: EndSessionRequest) -> ClResult<EndSessionOutcome> {
	let Some(hint) = &req.id_token_hint else {
		return Ok(EndSessionOutcome { redirect_uri: None, state: req.state });
	};
	let claims: IdTokenClaims = decode_jwt_no_verify(hint)?;

	if let Some(session_id) = &claims.sid {
		if let Ok(session) = app.session_store.find_session(session_id).await {
			app.session_store.delete_session(&session.session_id).await?;
		}
	}

	let Some(uri) = &req.post_logout_redirect_uri else {
		return Ok(EndSessionOutcome { redirect_uri: None, state: req.state });
	};

	let mut registered = false;
	for client_id in audiences(&claims.aud) {
		if let Ok(client) = app.client_store.find_client(tenant_id, client_id).await {
			if client.post_logout_redirect_uris.iter().any(|u| u == uri) {
				registered = true;
				break;
			}
		}
	}
	if !registered {
		return Err(Error::InvalidRequest("post_logout_redirect_uri is not registered for this client".into()));
	}

	Ok(EndSessionOutcome { redirect_uri: Some(uri.clone()), state: req.state })
}

// vim: ts=4
