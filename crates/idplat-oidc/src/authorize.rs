//! Authorize endpoint (`/connect/authorize`, §4.5 point 3, §6): validates
//! the request, resolves a journey policy, and either dispatches an
//! interactive journey or mints an authorization code directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use idplat_journey::orchestrator::{self, JourneyContext, JourneyResult};
use idplat_types::types::{
	Client, DataMap, GrantKind, JourneyType, PersistedGrant, ProtocolState,
};
use idplat_types::utils::random_handle;

use crate::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
	pub response_type: String,
	pub client_id: String,
	pub redirect_uri: String,
	#[serde(default)]
	pub scope: String,
	pub state: Option<String>,
	pub nonce: Option<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<String>,
	#[serde(default)]
	pub acr_values: String,
	pub prompt: Option<String>,
	pub request_uri: Option<String>,
}

#[derive(Debug)]
pub enum AuthorizeOutcome {
	/// The journey suspended; the caller (typically a UI layer) should
	/// present `view_name`/`view_model` and later call `continue_journey`.
	Interaction { journey_id: String, view_name: String, view_model: serde_json::Value },
	/// The journey completed; redirect the user agent to `redirect_uri`
	/// with `code`/`state` appended per RFC 6749 §4.1.2.
	Redirect { redirect_uri: String, code: String, state: Option<String> },
}

/// Resolves `request_uri` (§4.5 PAR) back into the original parameters,
/// consuming the one-shot `ProtocolState` it names.
pub async fn resolve_pushed_request(app: &App, request_uri: &str) -> ClResult<AuthorizeRequest> {
	let state = app.protocol_state_store.consume_state(request_uri).await?;
	if state.expires_at.is_past(Timestamp::now()) {
		return Err(Error::InvalidRequest("request_uri has expired".into()));
	}
	serde_json::from_str(&state.serialized_request).map_err(|e| Error::Internal(format!("stored PAR request is corrupt: {e}")))
}

pub async fn push_authorization_request(app: &App, client: &Client, req: &AuthorizeRequest) -> ClResult<(String, i64)> {
	validate_static(client, req)?;
	let lifetime = app.settings.get_i64(client.tenant_id, Some(&client.client_id), "oidc.par_lifetime_seconds", 60);
	let handle = format!("urn:ietf:params:oauth:request_uri:{}", random_handle()?);
	let serialized = serde_json::to_string(req).map_err(|e| Error::Internal(format!("PAR request serialization failed: {e}")))?;
	app.protocol_state_store
		.put_state(ProtocolState {
			correlation_id: handle.clone(),
			protocol_name: "oidc".into(),
			serialized_request: serialized,
			client_id: client.client_id.clone(),
			endpoint_type: "par".into(),
			properties: DataMap::new(),
			expires_at: Timestamp::now().plus_seconds(lifetime),
		})
		.await?;
	Ok((handle, lifetime))
}

/// Static validation that doesn't require a journey: client lookup,
/// redirect URI registration, response_type/scope support, PKCE
/// requirement for native clients (§4.5 "Validates client_id,
/// response_type, redirect_uri, scope, state, nonce, PKCE parameters").
fn validate_static(client: &Client, req: &AuthorizeRequest) -> ClResult<()> {
	if req.response_type != "code" {
		return Err(Error::UnsupportedResponseType(req.response_type.clone()));
	}
	if !client.redirect_uris.iter().any(|u| u == &req.redirect_uri) {
		return Err(Error::RedirectUriMismatch);
	}
	let requested_scopes: BTreeSet<&str> = req.scope.split_whitespace().collect();
	for scope in &requested_scopes {
		if !client.allowed_scopes.iter().any(|s| s == scope) {
			return Err(Error::InvalidScope((*scope).to_string()));
		}
	}
	if client.is_native_client && req.code_challenge.is_none() {
		return Err(Error::InvalidRequest("PKCE is required for native clients".into()));
	}
	if let Some(method) = &req.code_challenge_method {
		if method != "S256" {
			return Err(Error::InvalidRequest("only the S256 PKCE transform is accepted".into()));
		}
	}
	Ok(())
}

pub async fn authorize(app: &App, tenant_id: Option<TnId>, req: AuthorizeRequest) -> ClResult<AuthorizeOutcome> {
	let client = app.client_store.find_client(tenant_id, &req.client_id).await?;
	validate_static(&client, &req)?;

	let scopes: Vec<String> = req.scope.split_whitespace().map(str::to_string).collect();
	let acr_values: Vec<String> = req.acr_values.split_whitespace().map(str::to_string).collect();
	let mut additional_parameters = DataMap::new();
	if let Some(prompt) = &req.prompt {
		additional_parameters.insert("prompt".into(), serde_json::Value::String(prompt.clone()));
	}

	let correlation_id = random_handle()?;
	let ctx = JourneyContext {
		tenant_id,
		client: client.clone(),
		journey_type: JourneyType::SignIn,
		scopes: scopes.clone(),
		acr_values,
		additional_parameters,
		correlation_id: correlation_id.clone(),
	};

	app.protocol_state_store
		.put_state(ProtocolState {
			correlation_id: correlation_id.clone(),
			protocol_name: "oidc".into(),
			serialized_request: serde_json::to_string(&req).map_err(|e| Error::Internal(format!("authorize request serialization failed: {e}")))?,
			client_id: client.client_id.clone(),
			endpoint_type: "authorize".into(),
			properties: DataMap::new(),
			expires_at: Timestamp::now().plus_seconds(600),
		})
		.await?;

	let result = orchestrator::start(app, ctx).await?;
	finish(app, tenant_id, &client, &req, &scopes, &correlation_id, result).await
}

/// Resumes a suspended journey with user-supplied `input` and, on
/// completion, mints the authorization code the same way `authorize`
/// does (§4.1 "continue").
pub async fn continue_authorize(
	app: &App,
	tenant_id: Option<TnId>,
	journey_id: &str,
	step_id: &str,
	input: DataMap,
) -> ClResult<AuthorizeOutcome> {
	let journey = app.journey_state_store.find_state(journey_id).await?;
	let state = app.protocol_state_store.find_state(&journey.correlation_id).await?;
	let req: AuthorizeRequest =
		serde_json::from_str(&state.serialized_request).map_err(|e| Error::Internal(format!("stored authorize request is corrupt: {e}")))?;
	let client = app.client_store.find_client(tenant_id, &req.client_id).await?;
	let scopes: Vec<String> = req.scope.split_whitespace().map(str::to_string).collect();

	let result = orchestrator::r#continue(app, journey_id, orchestrator::JourneyStepInput { step_id: step_id.to_string(), input }).await?;
	finish(app, tenant_id, &client, &req, &scopes, &journey.correlation_id, result).await
}

async fn finish(
	app: &App,
	tenant_id: Option<TnId>,
	client: &Client,
	req: &AuthorizeRequest,
	scopes: &[String],
	correlation_id: &str,
	result: JourneyResult,
) -> ClResult<AuthorizeOutcome> {
	match result {
		JourneyResult::AwaitingInput { journey_id, view_name, view_model } => {
			Ok(AuthorizeOutcome::Interaction { journey_id, view_name, view_model })
		}
		JourneyResult::Failed { code, description, .. } => {
			app.protocol_state_store.consume_state(correlation_id).await.ok();
			Err(if code == "consent_denied" { Error::AccessDenied(description) } else { Error::ServerError(description) })
		}
		JourneyResult::Completed { user_id, amr, .. } => {
			app.protocol_state_store.consume_state(correlation_id).await.ok();
			let lifetime = app.settings.get_i64(tenant_id, Some(&client.client_id), "oidc.authorization_code_lifetime_seconds", 60);
			let code = random_handle()?;
			let payload = idplat_token::service::CodeGrantPayload {
				redirect_uri: req.redirect_uri.clone(),
				nonce: req.nonce.clone(),
				code_challenge: req.code_challenge.clone(),
				code_challenge_method: req.code_challenge_method.clone(),
				dpop_key_thumbprint: None,
			};
			let serialized_payload =
				serde_json::to_string(&payload).map_err(|e| Error::Internal(format!("code grant payload serialization failed: {e}")))?;

			let session_id = random_handle()?;
			let now = Timestamp::now();
			if let Some(subject_id) = &user_id {
				app.session_store
					.put_session(idplat_types::types::Session {
						session_id: session_id.clone(),
						subject_id: subject_id.clone(),
						tenant_id,
						auth_time: now,
						amr,
						acr: None,
						idle_deadline: now.plus_seconds(3600),
						absolute_deadline: now.plus_seconds(86_400),
						sso_mode: true,
					})
					.await?;
			}

			let grant = PersistedGrant {
				grant_key: code.clone(),
				kind: GrantKind::AuthorizationCode,
				subject_id: user_id,
				client_id: client.client_id.clone(),
				tenant_id,
				session_id: Some(session_id),
				scopes: scopes.iter().cloned().collect(),
				created_at: Timestamp::now(),
				expires_at: Timestamp::now().plus_seconds(lifetime),
				serialized_payload,
				consumed_at: None,
			};
			app.grant_store.put_grant(grant).await?;
			Ok(AuthorizeOutcome::Redirect { redirect_uri: req.redirect_uri.clone(), code, state: req.state.clone() })
		}
	}
}

// vim: ts=4
