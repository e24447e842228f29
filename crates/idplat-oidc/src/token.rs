//! Token endpoint (`/connect/token`, §4.5 point 4, §6): dispatches on
//! `grant_type` to the authorization_code, refresh_token,
//! client_credentials, CIBA, and device-code grants.

use serde::{Deserialize, Serialize};

use idplat_token::service::{self, AccessTokenRequest, IdTokenRequest, RefreshTokenRequest};
use idplat_types::types::GrantKind;

use crate::client_auth;
use crate::prelude::*;

#[derive(Debug, Default, Deserialize)]
pub struct TokenForm {
	pub grant_type: String,
	pub code: Option<String>,
	pub redirect_uri: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
	pub code_verifier: Option<String>,
	pub refresh_token: Option<String>,
	pub scope: Option<String>,
	pub auth_req_id: Option<String>,
	pub device_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: &'static str,
	pub expires_in: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}

pub async fn handle(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	match form.grant_type.as_str() {
		"authorization_code" => authorization_code(app, tenant_id, issuer, authorization_header, form).await,
		"refresh_token" => refresh_token(app, tenant_id, issuer, authorization_header, form).await,
		"client_credentials" => client_credentials(app, tenant_id, issuer, authorization_header, form).await,
		"urn:openid:params:grant-type:ciba" => ciba(app, tenant_id, issuer, authorization_header, form).await,
		"urn:ietf:params:oauth:grant-type:device_code" => device_code(app, tenant_id, issuer, authorization_header, form).await,
		other => Err(Error::UnsupportedGrantType(other.to_string())),
	}
}

async fn authenticate_client(app: &App, tenant_id: Option<TnId>, authorization_header: Option<&str>, form: &TokenForm) -> ClResult<idplat_types::types::Client> {
	let credentials = client_auth::from_request(authorization_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
	let client = app.client_store.find_client(tenant_id, &credentials.client_id).await?;
	client_auth::verify(&client, &credentials)?;
	Ok(client)
}

async fn mint_tokens(
	app: &App,
	tenant_id: Option<TnId>,
	issuer: &str,
	client: &idplat_types::types::Client,
	subject_id: Option<String>,
	scopes: Vec<String>,
	session_id: Option<String>,
	nonce: Option<String>,
	family_root_key: Option<String>,
) -> ClResult<TokenResponse> {
	let access_token = service::create_access_token(
		app,
		AccessTokenRequest {
			issuer: issuer.to_string(),
			subject_id: subject_id.clone(),
			client_id: client.client_id.clone(),
			audience: vec![client.client_id.clone()],
			scopes: scopes.clone(),
			tenant_id,
			session_id: session_id.clone(),
			dpop_key_thumbprint: None,
			claims: serde_json::Map::new(),
			is_reference: false,
			lifetime_seconds: client.access_token_lifetime_secs,
		},
	)
	.await?;

	let algorithm = app.settings.get(tenant_id, None, "token.default_algorithm").ok().flatten().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "RS256".into());
	let at_hash = service::compute_hash_claim(&algorithm, &access_token)?;

	let id_token = if scopes.iter().any(|s| s == "openid") {
		let Some(subject_id) = subject_id.clone() else {
			return Err(Error::ServerError("openid scope requires an authenticated subject".into()));
		};
		Some(
			service::create_id_token(
				app,
				IdTokenRequest {
					issuer: issuer.to_string(),
					subject_id,
					client_id: client.client_id.clone(),
					tenant_id,
					session_id: session_id.clone(),
					auth_time: Some(Timestamp::now()),
					amr: vec![],
					acr: None,
					nonce,
					at_hash: Some(at_hash),
					c_hash: None,
					lifetime_seconds: client.id_token_lifetime_secs,
				},
			)
			.await?,
		)
	} else {
		None
	};

	let refresh_token = if client.allowed_grant_types.contains(&idplat_types::types::GrantType::RefreshToken) {
		Some(
			service::create_refresh_token(
				app,
				RefreshTokenRequest {
					subject_id,
					client_id: client.client_id.clone(),
					scopes: scopes.clone(),
					tenant_id,
					session_id,
					family_root_key,
					lifetime_seconds: client.refresh_token_lifetime_secs,
				},
			)
			.await?,
		)
	} else {
		None
	};

	let lifetime = client.access_token_lifetime_secs.unwrap_or_else(|| app.settings.get_i64(tenant_id, Some(&client.client_id), "token.access_token_lifetime_seconds", 3600));

	Ok(TokenResponse {
		access_token,
		token_type: "Bearer",
		expires_in: lifetime,
		refresh_token,
		id_token,
		scope: if scopes.is_empty() { None } else { Some(scopes.join(" ")) },
	})
}

async fn authorization_code(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	let client = authenticate_client(app, tenant_id, authorization_header, &form).await?;
	let code = form.code.ok_or_else(|| Error::InvalidRequest("code is required".into()))?;

	let redeemed = service::redeem_code(app, &code).await?;
	if redeemed.grant.client_id != client.client_id {
		return Err(Error::InvalidGrant("authorization code was not issued to this client".into()));
	}
	let redirect_uri = form.redirect_uri.ok_or_else(|| Error::InvalidRequest("redirect_uri is required".into()))?;
	if redeemed.payload.redirect_uri != redirect_uri {
		return Err(Error::RedirectUriMismatch);
	}
	if let Some(code_challenge) = &redeemed.payload.code_challenge {
		let verifier = form.code_verifier.ok_or_else(|| Error::InvalidRequest("code_verifier is required".into()))?;
		crate::pkce::verify(code_challenge, redeemed.payload.code_challenge_method.as_deref(), &verifier)?;
	}

	mint_tokens(
		app,
		tenant_id,
		issuer,
		&client,
		redeemed.grant.subject_id,
		redeemed.grant.scopes.into_iter().collect(),
		redeemed.grant.session_id,
		redeemed.payload.nonce,
		Some(code),
	)
	.await
}

async fn refresh_token(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	let client = authenticate_client(app, tenant_id, authorization_header, &form).await?;
	let handle = form.refresh_token.ok_or_else(|| Error::InvalidRequest("refresh_token is required".into()))?;

	let redeemed = service::redeem_refresh(app, &handle).await?;
	if redeemed.grant.client_id != client.client_id {
		return Err(Error::InvalidGrant("refresh token was not issued to this client".into()));
	}

	let family_root_key = redeemed.payload.family_root_key.clone().or(Some(handle));
	let requested_scopes: Vec<String> = form
		.scope
		.map(|s| s.split_whitespace().map(str::to_string).collect())
		.unwrap_or_else(|| redeemed.grant.scopes.iter().cloned().collect());
	for scope in &requested_scopes {
		if !redeemed.grant.scopes.contains(scope) {
			return Err(Error::InvalidScope(scope.clone()));
		}
	}

	mint_tokens(app, tenant_id, issuer, &client, redeemed.grant.subject_id, requested_scopes, redeemed.grant.session_id, None, family_root_key).await
}

async fn client_credentials(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	let client = authenticate_client(app, tenant_id, authorization_header, &form).await?;
	if client.client_secrets.is_empty() {
		return Err(Error::UnauthorizedClient("client_credentials requires a confidential client".into()));
	}
	if !client.allowed_grant_types.contains(&idplat_types::types::GrantType::ClientCredentials) {
		return Err(Error::UnauthorizedClient("client is not authorized for client_credentials".into()));
	}

	let requested_scopes: Vec<String> = form.scope.map(|s| s.split_whitespace().map(str::to_string).collect()).unwrap_or_default();
	for scope in &requested_scopes {
		if !client.allowed_scopes.iter().any(|s| s == scope) {
			return Err(Error::InvalidScope(scope.clone()));
		}
	}

	mint_tokens(app, tenant_id, issuer, &client, None, requested_scopes, None, None, None).await
}

/// §4.5 CIBA: the grant is only redeemable once the out-of-band
/// authentication it names has completed; until then the token endpoint
/// answers `authorization_pending`.
async fn ciba(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	let client = authenticate_client(app, tenant_id, authorization_header, &form).await?;
	let auth_req_id = form.auth_req_id.ok_or_else(|| Error::InvalidRequest("auth_req_id is required".into()))?;

	let grant = app.grant_store.find_grant(&auth_req_id).await?;
	if grant.kind != GrantKind::CibaRequest || grant.client_id != client.client_id {
		return Err(Error::InvalidGrant("unknown CIBA request".into()));
	}
	if grant.expires_at.is_past(Timestamp::now()) {
		return Err(Error::ExpiredToken("CIBA request expired".into()));
	}
	let Some(subject_id) = grant.subject_id.clone() else {
		return Err(Error::AuthorizationPending);
	};

	let consumed = app.grant_store.consume_grant(&auth_req_id).await.map_err(|_| Error::InvalidGrant("CIBA request already consumed".into()))?;
	mint_tokens(app, tenant_id, issuer, &client, Some(subject_id), consumed.scopes.into_iter().collect(), consumed.session_id, None, None).await
}

/// §4.5 device-code grant: the grant is only redeemable once the user
/// has approved the paired user_code out-of-band.
async fn device_code(app: &App, tenant_id: Option<TnId>, issuer: &str, authorization_header: Option<&str>, form: TokenForm) -> ClResult<TokenResponse> {
	let client = authenticate_client(app, tenant_id, authorization_header, &form).await?;
	let device_code = form.device_code.ok_or_else(|| Error::InvalidRequest("device_code is required".into()))?;

	let grant = app.grant_store.find_grant(&device_code).await?;
	if grant.kind != GrantKind::DeviceCode || grant.client_id != client.client_id {
		return Err(Error::InvalidGrant("unknown device_code".into()));
	}
	if grant.expires_at.is_past(Timestamp::now()) {
		return Err(Error::ExpiredToken("device code expired".into()));
	}
	let Some(subject_id) = grant.subject_id.clone() else {
		return Err(Error::AuthorizationPending);
	};

	let consumed = app.grant_store.consume_grant(&device_code).await.map_err(|_| Error::InvalidGrant("device code already consumed".into()))?;
	mint_tokens(app, tenant_id, issuer, &client, Some(subject_id), consumed.scopes.into_iter().collect(), consumed.session_id, None, None).await
}

// vim: ts=4
