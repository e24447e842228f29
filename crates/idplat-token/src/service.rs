//! Token Service operations (§4.3): claim assembly and signing for
//! access/id tokens, opaque refresh-token issuance, one-shot grant
//! redemption, and revocation with family cascade.

use std::sync::Arc;

use idplat_core::claims::ClaimsContext;
use idplat_keys::encryption::EncryptionService;
use idplat_types::utils::{left_half_hash, random_handle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prelude::*;

/// Request to mint an access token (§4.3 point 1).
pub struct AccessTokenRequest {
	pub issuer: String,
	pub subject_id: Option<String>,
	pub client_id: String,
	pub audience: Vec<String>,
	pub scopes: Vec<String>,
	pub tenant_id: Option<TnId>,
	pub session_id: Option<String>,
	/// `cnf.jkt` value when the request carries a DPoP key thumbprint.
	pub dpop_key_thumbprint: Option<String>,
	/// Caller-supplied claims, applied last; never override earlier claims.
	pub claims: Map<String, Value>,
	/// When set, a reference token is minted instead of a self-contained JWT.
	pub is_reference: bool,
	pub lifetime_seconds: Option<i64>,
}

pub struct IdTokenRequest {
	pub issuer: String,
	pub subject_id: String,
	pub client_id: String,
	pub tenant_id: Option<TnId>,
	pub session_id: Option<String>,
	pub auth_time: Option<Timestamp>,
	pub amr: Vec<String>,
	pub acr: Option<String>,
	pub nonce: Option<String>,
	pub at_hash: Option<String>,
	pub c_hash: Option<String>,
	pub lifetime_seconds: Option<i64>,
}

pub struct RefreshTokenRequest {
	pub subject_id: Option<String>,
	pub client_id: String,
	pub scopes: Vec<String>,
	pub tenant_id: Option<TnId>,
	pub session_id: Option<String>,
	pub family_root_key: Option<String>,
	pub lifetime_seconds: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeGrantPayload {
	pub redirect_uri: String,
	pub nonce: Option<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<String>,
	pub dpop_key_thumbprint: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshGrantPayload {
	pub family_root_key: Option<String>,
	pub dpop_key_thumbprint: Option<String>,
}

pub struct CodeGrant {
	pub grant: PersistedGrant,
	pub payload: CodeGrantPayload,
}

pub struct RefreshGrant {
	pub grant: PersistedGrant,
	pub payload: RefreshGrantPayload,
}

/// Inserts `value` at `key` only if `key` is not already present,
/// implementing the "duplicate claim types are dropped silently,
/// keeping the earlier value" rule (§4.3 point 1).
fn insert_if_absent(claims: &mut Map<String, Value>, key: &str, value: Value) {
	claims.entry(key.to_string()).or_insert(value);
}

pub async fn create_access_token(app: &App, req: AccessTokenRequest) -> ClResult<String> {
	let mut claims = Map::new();
	let now = Timestamp::now();
	let default_lifetime = app.settings.get_i64(req.tenant_id, Some(&req.client_id), "token.access_token_lifetime_seconds", 3600);
	let lifetime = req.lifetime_seconds.unwrap_or(default_lifetime);
	let jti = random_handle()?;

	if let Some(sub) = &req.subject_id {
		insert_if_absent(&mut claims, "sub", Value::String(sub.clone()));
	}
	insert_if_absent(&mut claims, "client_id", Value::String(req.client_id.clone()));
	insert_if_absent(
		&mut claims,
		"scope",
		Value::Array(req.scopes.iter().map(|s| Value::String(s.clone())).collect()),
	);
	insert_if_absent(&mut claims, "jti", Value::String(jti));
	insert_if_absent(&mut claims, "iat", Value::Number(now.0.into()));
	insert_if_absent(&mut claims, "nbf", Value::Number(now.0.into()));
	insert_if_absent(&mut claims, "exp", Value::Number((now.0 + lifetime).into()));
	insert_if_absent(&mut claims, "iss", Value::String(req.issuer.clone()));
	insert_if_absent(
		&mut claims,
		"aud",
		if req.audience.len() == 1 {
			Value::String(req.audience[0].clone())
		} else {
			Value::Array(req.audience.iter().map(|a| Value::String(a.clone())).collect())
		},
	);
	if let Some(tenant_id) = req.tenant_id {
		insert_if_absent(&mut claims, "tenant_id", Value::Number(tenant_id.0.into()));
	}

	if let Some(jkt) = &req.dpop_key_thumbprint {
		let mut cnf = Map::new();
		cnf.insert("jkt".into(), Value::String(jkt.clone()));
		insert_if_absent(&mut claims, "cnf", Value::Object(cnf));
	}

	if let Some(sid) = &req.session_id {
		insert_if_absent(&mut claims, "sid", Value::String(sid.clone()));
	}

	let provider_ctx = ClaimsContext {
		subject_id: req.subject_id.clone(),
		client_id: req.client_id.clone(),
		scopes: req.scopes.clone(),
		tenant_id: req.tenant_id,
	};
	let providers = app
		.claims_providers
		.read()
		.map_err(|_| Error::Internal("claims provider list poisoned".into()))?
		.clone();
	for provider in &providers {
		let provided = provider.claims(&provider_ctx).await?;
		for (key, value) in provided {
			insert_if_absent(&mut claims, &key, value);
		}
	}

	for (key, value) in req.claims {
		insert_if_absent(&mut claims, &key, value);
	}

	if req.is_reference {
		let handle = random_handle()?;
		let payload = serde_json::to_string(&claims).map_err(|e| Error::Internal(format!("reference token claim serialization failed: {e}")))?;
		let grant = PersistedGrant {
			grant_key: handle.clone(),
			kind: GrantKind::ReferenceToken,
			subject_id: req.subject_id,
			client_id: req.client_id,
			tenant_id: req.tenant_id,
			session_id: req.session_id,
			scopes: req.scopes.into_iter().collect(),
			created_at: now,
			expires_at: now.plus_seconds(lifetime),
			serialized_payload: payload,
			consumed_at: None,
		};
		app.grant_store.put_grant(grant).await?;
		return Ok(handle);
	}

	let algorithm = app.settings.get(req.tenant_id, None, "token.default_algorithm").ok().flatten().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "RS256".into());
	let key = app.signing_store.active_key(req.tenant_id, &algorithm).await?;
	let encryption = app.ext::<Arc<dyn EncryptionService>>()?;
	crate::jwt::sign(&key, "at+jwt", &claims, encryption.as_ref())
}

pub async fn create_id_token(app: &App, req: IdTokenRequest) -> ClResult<String> {
	let now = Timestamp::now();
	let default_lifetime = app.settings.get_i64(req.tenant_id, Some(&req.client_id), "token.id_token_lifetime_seconds", 300);
	let lifetime = req.lifetime_seconds.unwrap_or(default_lifetime);

	let mut claims = Map::new();
	claims.insert("sub".into(), Value::String(req.subject_id));
	claims.insert("aud".into(), Value::Array(vec![Value::String(req.client_id.clone())]));
	claims.insert("iss".into(), Value::String(req.issuer));
	claims.insert("iat".into(), Value::Number(now.0.into()));
	claims.insert("exp".into(), Value::Number((now.0 + lifetime).into()));
	if let Some(auth_time) = req.auth_time {
		claims.insert("auth_time".into(), Value::Number(auth_time.0.into()));
	}
	if !req.amr.is_empty() {
		claims.insert("amr".into(), Value::Array(req.amr.into_iter().map(Value::String).collect()));
	}
	if let Some(acr) = req.acr {
		claims.insert("acr".into(), Value::String(acr));
	}
	if let Some(nonce) = req.nonce {
		claims.insert("nonce".into(), Value::String(nonce));
	}
	if let Some(sid) = req.session_id {
		claims.insert("sid".into(), Value::String(sid));
	}
	if let Some(at_hash) = req.at_hash {
		claims.insert("at_hash".into(), Value::String(at_hash));
	}
	if let Some(c_hash) = req.c_hash {
		claims.insert("c_hash".into(), Value::String(c_hash));
	}

	let algorithm = app.settings.get(req.tenant_id, None, "token.default_algorithm").ok().flatten().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "RS256".into());
	let key = app.signing_store.active_key(req.tenant_id, &algorithm).await?;
	let encryption = app.ext::<Arc<dyn EncryptionService>>()?;
	crate::jwt::sign(&key, "JWT", &claims, encryption.as_ref())
}

pub async fn create_refresh_token(app: &App, req: RefreshTokenRequest) -> ClResult<String> {
	let now = Timestamp::now();
	let default_lifetime = app.settings.get_i64(req.tenant_id, Some(&req.client_id), "token.refresh_token_lifetime_seconds", 2_592_000);
	let lifetime = req.lifetime_seconds.unwrap_or(default_lifetime);

	let handle = random_handle()?;
	let payload = RefreshGrantPayload { family_root_key: req.family_root_key, dpop_key_thumbprint: None };
	let serialized_payload =
		serde_json::to_string(&payload).map_err(|e| Error::Internal(format!("refresh grant payload serialization failed: {e}")))?;

	let grant = PersistedGrant {
		grant_key: handle.clone(),
		kind: GrantKind::RefreshToken,
		subject_id: req.subject_id,
		client_id: req.client_id,
		tenant_id: req.tenant_id,
		session_id: req.session_id,
		scopes: req.scopes.into_iter().collect(),
		created_at: now,
		expires_at: now.plus_seconds(lifetime),
		serialized_payload,
		consumed_at: None,
	};
	app.grant_store.put_grant(grant).await?;
	Ok(handle)
}

/// Computes `at_hash`/`c_hash` per §4.3 point 2 / §8 invariant 3: the
/// hash matching the signing algorithm, left-most half, base64url
/// without padding.
pub fn compute_hash_claim(algorithm: &str, input: &str) -> ClResult<String> {
	left_half_hash(algorithm, input.as_bytes())
}

/// Atomically redeems an authorization code. §8 invariant 1: concurrent
/// redemptions on the same handle yield exactly one success.
pub async fn redeem_code(app: &App, code: &str) -> ClResult<CodeGrant> {
	let grant = app.grant_store.consume_grant(code).await?;
	if grant.kind != GrantKind::AuthorizationCode {
		return Err(Error::InvalidRequest("grant is not an authorization code".into()));
	}
	let payload: CodeGrantPayload = serde_json::from_str(&grant.serialized_payload)
		.map_err(|e| Error::Internal(format!("stored code grant payload is corrupt: {e}")))?;
	Ok(CodeGrant { grant, payload })
}

pub async fn redeem_refresh(app: &App, handle: &str) -> ClResult<RefreshGrant> {
	let grant = app.grant_store.consume_grant(handle).await?;
	if grant.kind != GrantKind::RefreshToken {
		return Err(Error::InvalidRequest("grant is not a refresh token".into()));
	}
	let payload: RefreshGrantPayload = serde_json::from_str(&grant.serialized_payload)
		.map_err(|e| Error::Internal(format!("stored refresh grant payload is corrupt: {e}")))?;
	Ok(RefreshGrant { grant, payload })
}

/// Resolves an access token — either a self-contained JWT or a reference
/// handle — back to its claims, verifying the JWT's signature against the
/// key named by its `kid` (§4.3 "Signing"). Used by the userinfo and
/// introspection endpoints.
pub async fn introspect_access_token(app: &App, token: &str) -> ClResult<Map<String, Value>> {
	if let Ok(kid) = crate::jwt::peek_kid(token) {
		let key = app.signing_store.find_key(&kid).await?;
		return crate::jwt::verify(&key, token);
	}

	let grant = app.grant_store.find_grant(token).await?;
	if grant.kind != GrantKind::ReferenceToken {
		return Err(Error::InvalidRequest("token is not an access token".into()));
	}
	if grant.consumed_at.is_some() || grant.expires_at.is_past(Timestamp::now()) {
		return Err(Error::Unauthorized);
	}
	serde_json::from_str(&grant.serialized_payload).map_err(|e| Error::Internal(format!("stored reference token claims are corrupt: {e}")))
}

/// Revokes `handle`; cascades to the refresh-token family it roots when
/// the client's revocation policy requires it (§4.3 point 5).
pub async fn revoke(app: &App, handle: &str, client_id: Option<&str>, tenant_id: Option<TnId>) -> ClResult<()> {
	let cascades = app.settings.get(tenant_id, client_id, "token.refresh_family_revocation").ok().flatten().and_then(|v| v.as_bool()).unwrap_or(true);

	app.grant_store.revoke_grant(handle).await?;
	if cascades {
		app.grant_store.revoke_family(handle).await?;
	}
	Ok(())
}

// vim: ts=4
