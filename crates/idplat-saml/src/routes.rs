//! Axum router for the SAML protocol surface (§6 EXTERNAL INTERFACES,
//! SAML: "IdP SSO (Redirect + POST bindings), IdP metadata, SLO
//! endpoint. SP-side ACS per-tenant.").

use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use idplat_types::extract::OptionalAuth;
use idplat_tenant::resolver::{resolve_issuer, resolve_tenant, TenantResolutionInput};

use crate::idp::{self, SsoOutcome};
use crate::prelude::*;
use crate::sp;

pub fn router() -> Router<App> {
	Router::new()
		.route("/saml/sso", get(sso_redirect).post(sso_post))
		.route("/saml/sso/continue/{journey_id}/{step_id}", post(sso_continue))
		.route("/saml/metadata", get(metadata))
		.route("/saml/slo", get(slo).post(slo))
		.route("/saml/login", get(sp_login))
		.route("/saml/acs", post(acs))
}

async fn resolve(app: &App, headers: &HeaderMap) -> ClResult<(Option<TnId>, String)> {
	let host = headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or("localhost");
	let scheme = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()).unwrap_or("https");
	let header_tenant_id = headers.get("x-tenant-id").and_then(|v| v.to_str().ok());
	let input = TenantResolutionInput { header_tenant_id, bearer_tenant_id: None, client: None, host_tenant_id: None, authenticated: None };
	let tenant_id = resolve_tenant(&input)?;
	let issuer = resolve_issuer(app, tenant_id, &format!("{scheme}://{host}")).await?;
	Ok((tenant_id, issuer))
}

fn outcome_to_response(outcome: SsoOutcome) -> axum::response::Response {
	match outcome {
		SsoOutcome::Interaction { journey_id, view_name, view_model } => {
			Json(serde_json::json!({ "journey_id": journey_id, "view": view_name, "view_model": view_model })).into_response()
		}
		SsoOutcome::PostForm { html } => Html(html).into_response(),
	}
}

#[derive(Debug, Deserialize)]
struct SsoQuery {
	#[serde(rename = "SAMLRequest")]
	saml_request: String,
	#[serde(rename = "RelayState")]
	relay_state: Option<String>,
}

async fn sso_redirect(State(app): State<App>, headers: HeaderMap, Query(req): Query<SsoQuery>) -> ClResult<impl IntoResponse> {
	let (tenant_id, issuer) = resolve(&app, &headers).await?;
	let outcome = idp::sso_redirect(&app, tenant_id, &issuer, &req.saml_request, req.relay_state).await?;
	Ok(outcome_to_response(outcome))
}

#[derive(Debug, Deserialize)]
struct SsoForm {
	#[serde(rename = "SAMLRequest")]
	saml_request: String,
	#[serde(rename = "RelayState")]
	relay_state: Option<String>,
}

async fn sso_post(State(app): State<App>, headers: HeaderMap, Form(req): Form<SsoForm>) -> ClResult<impl IntoResponse> {
	let (tenant_id, issuer) = resolve(&app, &headers).await?;
	let outcome = idp::sso_post(&app, tenant_id, &issuer, &req.saml_request, req.relay_state).await?;
	Ok(outcome_to_response(outcome))
}

#[derive(Debug, Deserialize)]
struct ContinueForm {
	#[serde(flatten)]
	input: idplat_types::types::DataMap,
}

async fn sso_continue(
	State(app): State<App>,
	headers: HeaderMap,
	axum::extract::Path((journey_id, step_id)): axum::extract::Path<(String, String)>,
	Form(form): Form<ContinueForm>,
) -> ClResult<impl IntoResponse> {
	let (tenant_id, issuer) = resolve(&app, &headers).await?;
	let outcome = idp::continue_sso(&app, tenant_id, &issuer, &journey_id, &step_id, form.input).await?;
	Ok(outcome_to_response(outcome))
}

async fn metadata(State(app): State<App>, headers: HeaderMap) -> ClResult<impl IntoResponse> {
	let (tenant_id, issuer) = resolve(&app, &headers).await?;
	let xml = crate::metadata::idp_metadata_document(&app, tenant_id, &issuer).await?;
	Ok(([(axum::http::header::CONTENT_TYPE, "application/samlmetadata+xml")], xml))
}

#[derive(Debug, Deserialize)]
struct SloQuery {
	#[serde(rename = "SessionIndex")]
	session_index: Option<String>,
}

async fn slo(State(app): State<App>, headers: HeaderMap, auth: OptionalAuth, Query(req): Query<SloQuery>) -> ClResult<impl IntoResponse> {
	let (_, _) = resolve(&app, &headers).await?;
	if let Some(session_id) = req.session_index.or_else(|| auth.0.as_ref().and_then(|a| a.session_id.clone())) {
		app.session_store.delete_session(&session_id).await.ok();
	}
	Ok(axum::http::StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct SpLoginQuery {
	acs_url: String,
}

async fn sp_login(State(app): State<App>, headers: HeaderMap, Query(req): Query<SpLoginQuery>) -> ClResult<impl IntoResponse> {
	let (tenant_id, issuer) = resolve(&app, &headers).await?;
	let redirect_url = sp::initiate(&app, tenant_id, &issuer, &req.acs_url).await?;
	Ok(Redirect::to(&redirect_url))
}

#[derive(Debug, Deserialize)]
struct AcsForm {
	#[serde(rename = "SAMLResponse")]
	saml_response: String,
}

async fn acs(State(app): State<App>, headers: HeaderMap, Form(form): Form<AcsForm>) -> ClResult<impl IntoResponse> {
	let (tenant_id, _) = resolve(&app, &headers).await?;
	let assertion = sp::acs(&app, tenant_id, &form.saml_response).await?;
	Ok(Json(serde_json::json!({
		"name_id": assertion.name_id,
		"issuer": assertion.issuer,
		"attributes": assertion.attributes,
	})))
}

// vim: ts=4
