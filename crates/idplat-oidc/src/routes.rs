//! Axum router for the OIDC protocol surface (§6 EXTERNAL INTERFACES,
//! OIDC table): discovery, JWKS, authorize, token, userinfo,
//! revocation, introspection, end-session, PAR, CIBA, and the device
//! authorization grant.

use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use idplat_types::extract::OptionalAuth;
use idplat_types::types::Client;
use idplat_tenant::resolver::{resolve_issuer, resolve_tenant, TenantResolutionInput};

use crate::authorize::{self, AuthorizeOutcome, AuthorizeRequest};
use crate::prelude::*;

pub fn router() -> Router<App> {
	Router::new()
		.route("/.well-known/openid-configuration", get(discovery))
		.route("/.well-known/jwks", get(jwks))
		.route("/connect/authorize", get(authorize_get))
		.route("/connect/authorize/continue/{journey_id}/{step_id}", post(authorize_continue))
		.route("/connect/par", post(pushed_authorization_request))
		.route("/connect/token", post(token))
		.route("/connect/userinfo", get(userinfo))
		.route("/connect/revocation", post(revocation))
		.route("/connect/introspect", post(introspection))
		.route("/connect/endsession", get(end_session))
		.route("/connect/ciba", post(ciba))
		.route("/connect/deviceauthorization", post(device_authorization))
}

fn request_scheme_host(headers: &HeaderMap) -> String {
	let host = headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or("localhost");
	let scheme = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()).unwrap_or("https");
	format!("{scheme}://{host}")
}

async fn resolve(app: &App, headers: &HeaderMap, auth: &OptionalAuth, client: Option<&Client>) -> ClResult<(Option<TnId>, String)> {
	let header_tenant_id = headers.get("x-tenant-id").and_then(|v| v.to_str().ok());
	let input = TenantResolutionInput {
		header_tenant_id,
		bearer_tenant_id: auth.0.as_ref().and_then(|a| a.tenant_id),
		client,
		host_tenant_id: None,
		authenticated: auth.0.as_ref(),
	};
	let tenant_id = resolve_tenant(&input)?;
	let issuer = resolve_issuer(app, tenant_id, &request_scheme_host(headers)).await?;
	Ok((tenant_id, issuer))
}

async fn discovery(State(app): State<App>, headers: HeaderMap) -> ClResult<impl IntoResponse> {
	let (_, issuer) = resolve(&app, &headers, &OptionalAuth(None), None).await?;
	Ok(Json(crate::discovery::discovery_document(&issuer)))
}

async fn jwks(State(app): State<App>, headers: HeaderMap) -> ClResult<impl IntoResponse> {
	let (tenant_id, _) = resolve(&app, &headers, &OptionalAuth(None), None).await?;
	Ok(Json(crate::discovery::jwks_document(&app, tenant_id).await?))
}

fn outcome_to_response(outcome: AuthorizeOutcome) -> ClResult<axum::response::Response> {
	match outcome {
		AuthorizeOutcome::Interaction { journey_id, view_name, view_model } => {
			Ok(Json(serde_json::json!({ "journey_id": journey_id, "view": view_name, "view_model": view_model })).into_response())
		}
		AuthorizeOutcome::Redirect { redirect_uri, code, state } => {
			let mut url = url::Url::parse(&redirect_uri).map_err(|e| {
				warn!("registered redirect_uri failed to parse as a URL: {e}");
				Error::RedirectUriMismatch
			})?;
			url.query_pairs_mut().append_pair("code", &code);
			if let Some(state) = &state {
				url.query_pairs_mut().append_pair("state", state);
			}
			Ok(Redirect::to(url.as_str()).into_response())
		}
	}
}

async fn authorize_get(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Query(req): Query<AuthorizeRequest>) -> ClResult<impl IntoResponse> {
	let req = if let Some(request_uri) = &req.request_uri {
		authorize::resolve_pushed_request(&app, request_uri).await?
	} else {
		req
	};
	let client = app.client_store.find_client(None, &req.client_id).await.ok();
	let (tenant_id, _) = resolve(&app, &headers, &auth, client.as_ref()).await?;
	let outcome = authorize::authorize(&app, tenant_id, req).await?;
	outcome_to_response(outcome)
}

#[derive(Debug, Deserialize)]
struct ContinueForm {
	#[serde(flatten)]
	input: idplat_types::types::DataMap,
}

async fn authorize_continue(
	State(app): State<App>,
	headers: HeaderMap,
	auth: OptionalAuth,
	axum::extract::Path((journey_id, step_id)): axum::extract::Path<(String, String)>,
	Form(form): Form<ContinueForm>,
) -> ClResult<impl IntoResponse> {
	let (tenant_id, _) = resolve(&app, &headers, &auth, None).await?;
	let outcome = authorize::continue_authorize(&app, tenant_id, &journey_id, &step_id, form.input).await?;
	outcome_to_response(outcome)
}

async fn pushed_authorization_request(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Form(req): Form<AuthorizeRequest>) -> ClResult<impl IntoResponse> {
	let client = app.client_store.find_client(None, &req.client_id).await?;
	let (_, _) = resolve(&app, &headers, &auth, Some(&client)).await?;
	let (request_uri, expires_in) = authorize::push_authorization_request(&app, &client, &req).await?;
	Ok(Json(serde_json::json!({ "request_uri": request_uri, "expires_in": expires_in })))
}

async fn token(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Form(form): Form<crate::token::TokenForm>) -> ClResult<impl IntoResponse> {
	let authorization_header = headers.get("authorization").and_then(|v| v.to_str().ok());
	let client = match &form.client_id {
		Some(client_id) => app.client_store.find_client(None, client_id).await.ok(),
		None => None,
	};
	let (tenant_id, issuer) = resolve(&app, &headers, &auth, client.as_ref()).await?;
	let response = crate::token::handle(&app, tenant_id, &issuer, authorization_header, form).await?;
	Ok(Json(response))
}

async fn userinfo(State(app): State<App>, headers: HeaderMap) -> ClResult<impl IntoResponse> {
	let bearer = headers
		.get("authorization")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.ok_or(Error::Unauthorized)?;
	Ok(Json(crate::userinfo::userinfo(&app, bearer).await?))
}

async fn revocation(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Form(form): Form<crate::revocation::RevocationForm>) -> ClResult<impl IntoResponse> {
	let authorization_header = headers.get("authorization").and_then(|v| v.to_str().ok());
	let (tenant_id, _) = resolve(&app, &headers, &auth, None).await?;
	crate::revocation::revoke(&app, tenant_id, authorization_header, form).await?;
	Ok(axum::http::StatusCode::OK)
}

async fn introspection(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Form(form): Form<crate::introspection::IntrospectionForm>) -> ClResult<impl IntoResponse> {
	let authorization_header = headers.get("authorization").and_then(|v| v.to_str().ok());
	let (tenant_id, _) = resolve(&app, &headers, &auth, None).await?;
	Ok(Json(crate::introspection::introspect(&app, tenant_id, authorization_header, form).await?))
}

async fn end_session(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Query(req): Query<crate::end_session::EndSessionRequest>) -> ClResult<impl IntoResponse> {
	let (tenant_id, _) = resolve(&app, &headers, &auth, None).await?;
	let outcome = crate::end_session::end_session(&app, tenant_id, req).await?;
	match outcome.redirect_uri {
		Some(mut uri) => {
			if let Some(state) = &outcome.state {
				let separator = if uri.contains('?') { '&' } else { '?' };
				uri = format!("{uri}{separator}state={state}");
			}
			Ok(Redirect::to(&uri).into_response())
		}
		None => Ok(axum::http::StatusCode::OK.into_response()),
	}
}

async fn ciba(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Form(form): Form<crate::ciba::CibaForm>) -> ClResult<impl IntoResponse> {
	let authorization_header = headers.get("authorization").and_then(|v| v.to_str().ok());
	let (tenant_id, _) = resolve(&app, &headers, &auth, None).await?;
	Ok(Json(crate::ciba::request(&app, tenant_id, authorization_header, form).await?))
}

async fn device_authorization(
	State(app): State<App>,
	headers: HeaderMap,
	auth: OptionalAuth,
	Form(form): Form<crate::device::DeviceAuthorizationForm>,
) -> ClResult<impl IntoResponse> {
	let authorization_header = headers.get("authorization").and_then(|v| v.to_str().ok());
	let (tenant_id, issuer) = resolve(&app, &headers, &auth, None).await?;
	Ok(Json(crate::device::authorize_device(&app, tenant_id, &issuer, authorization_header, form).await?))
}

// vim: ts=4
