//! Backchannel authentication request endpoint (`/connect/ciba`, §4.5
//! CIBA, §6): starts a sign-in journey out-of-band, keyed by
//! `login_hint` rather than a user-agent redirect. The client later
//! polls `/connect/token` with the returned `auth_req_id`.

use serde::{Deserialize, Serialize};

use idplat_journey::orchestrator::{self, JourneyContext};
use idplat_types::types::{DataMap, GrantKind, JourneyType, PersistedGrant};
use idplat_types::utils::random_handle;
use serde_json::Value;

use crate::client_auth;
use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct CibaForm {
	pub scope: String,
	pub login_hint: Option<String>,
	pub client_notification_token: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CibaResponse {
	pub auth_req_id: String,
	pub expires_in: i64,
	pub interval: i64,
}

pub async fn request(app: &App, tenant_id: Option<TnId>, authorization_header: Option<&str>, form: CibaForm) -> ClResult<CibaResponse> {
	let credentials = client_auth::from_request(authorization_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
	let client = app.client_store.find_client(tenant_id, &credentials.client_id).await?;
	client_auth::verify(&client, &credentials)?;
	if !client.ciba_enabled {
		return Err(Error::UnauthorizedClient("client is not enabled for CIBA".into()));
	}
	let login_hint = form.login_hint.ok_or_else(|| Error::InvalidRequest("login_hint is required".into()))?;
	let user = app.user_store.find_user(tenant_id, &login_hint).await?;

	let scopes: Vec<String> = form.scope.split_whitespace().map(str::to_string).collect();
	for scope in &scopes {
		if !client.allowed_scopes.iter().any(|s| s == scope) {
			return Err(Error::InvalidScope(scope.clone()));
		}
	}

	let mut additional_parameters = DataMap::new();
	additional_parameters.insert("ciba".into(), Value::Bool(true));
	if let Some(token) = &form.client_notification_token {
		additional_parameters.insert("client_notification_token".into(), Value::String(token.clone()));
	}

	let correlation_id = random_handle()?;
	let ctx = JourneyContext {
		tenant_id,
		client: client.clone(),
		journey_type: JourneyType::SignIn,
		scopes: scopes.clone(),
		acr_values: vec![],
		additional_parameters,
		correlation_id: correlation_id.clone(),
	};

	let lifetime = app.settings.get_i64(tenant_id, Some(&client.client_id), "oidc.ciba_lifetime_seconds", 300);
	let interval = app.settings.get_i64(tenant_id, Some(&client.client_id), "oidc.ciba_polling_interval_seconds", 5);
	let auth_req_id = random_handle()?;
	let now = Timestamp::now();

	let result = orchestrator::start(app, ctx).await?;
	let subject_id = match result {
		orchestrator::JourneyResult::Completed { user_id, .. } => user_id.or(Some(user.subject_id)),
		orchestrator::JourneyResult::AwaitingInput { .. } => None,
		orchestrator::JourneyResult::Failed { description, .. } => return Err(Error::AccessDenied(description)),
	};

	let grant = PersistedGrant {
		grant_key: auth_req_id.clone(),
		kind: GrantKind::CibaRequest,
		subject_id,
		client_id: client.client_id.clone(),
		tenant_id,
		session_id: None,
		scopes: scopes.into_iter().collect(),
		created_at: now,
		expires_at: now.plus_seconds(lifetime),
		serialized_payload: String::new(),
		consumed_at: None,
	};
	app.grant_store.put_grant(grant).await?;

	Ok(CibaResponse { auth_req_id, expires_in: lifetime, interval })
}

// vim: ts=4
