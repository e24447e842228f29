//! Discovery (`/.well-known/openid-configuration`) and JWKS
//! (`/.well-known/jwks`) documents (§4.5, §6).

use serde_json::{json, Value};

use crate::prelude::*;

pub fn discovery_document(issuer: &str) -> Value {
	json!({
		"issuer": issuer,
		"authorization_endpoint": format!("{issuer}/connect/authorize"),
		"token_endpoint": format!("{issuer}/connect/token"),
		"userinfo_endpoint": format!("{issuer}/connect/userinfo"),
		"jwks_uri": format!("{issuer}/.well-known/jwks"),
		"revocation_endpoint": format!("{issuer}/connect/revocation"),
		"introspection_endpoint": format!("{issuer}/connect/introspect"),
		"end_session_endpoint": format!("{issuer}/connect/endsession"),
		"pushed_authorization_request_endpoint": format!("{issuer}/connect/par"),
		"backchannel_authentication_endpoint": format!("{issuer}/connect/ciba"),
		"device_authorization_endpoint": format!("{issuer}/connect/deviceauthorization"),
		"require_pushed_authorization_requests": false,
		"response_types_supported": ["code"],
		"response_modes_supported": ["query", "fragment"],
		"grant_types_supported": [
			"authorization_code",
			"refresh_token",
			"client_credentials",
			"urn:openid:params:grant-type:ciba",
			"urn:ietf:params:oauth:grant-type:device_code",
		],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["RS256", "ES256"],
		"token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
		"code_challenge_methods_supported": ["S256"],
		"backchannel_token_delivery_modes_supported": ["poll"],
		"scopes_supported": ["openid", "profile", "email", "offline_access"],
		"claims_supported": ["sub", "iss", "aud", "exp", "iat", "auth_time", "amr", "acr"],
	})
}

pub async fn jwks_document(app: &App, tenant_id: Option<TnId>) -> ClResult<idplat_keys::jwks::JwkSet> {
	let keys = app.signing_store.publishable_keys(tenant_id).await?;
	idplat_keys::jwks::build_jwks(&keys)
}

// vim: ts=4
