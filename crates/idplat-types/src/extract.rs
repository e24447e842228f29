//! Custom Axum extractors for tenant resolution (§4.7).
//!
//! Provides `FromRequestParts` implementations for `TnId` and `IdTag`
//! that work with any state implementing the required traits, following
//! the teacher's `cloudillo-types::extract` pattern.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;
use crate::types::TnId;

/// Raw tenant hint extracted from request middleware (the
/// `X-Tenant-Id` header, a `tenant_id` bearer claim, the client's bound
/// tenant, or host-based mapping — §4.7's resolution order). Tenant
/// resolution middleware inserts the already-resolved `IdTag` (or `TnId`
/// directly) into `parts.extensions`; this extractor only reads it back.
#[derive(Clone, Debug)]
pub struct IdTag(pub Box<str>);

impl IdTag {
	pub fn new(id_tag: &str) -> IdTag {
		IdTag(Box::from(id_tag))
	}
}

impl<S> FromRequestParts<S> for IdTag
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if let Some(id_tag) = parts.extensions.get::<IdTag>().cloned() {
			Ok(id_tag)
		} else {
			Err(Error::PermissionDenied)
		}
	}
}

/// Trait for resolving `TnId` from an identity tag string.
///
/// Implement this on your application state type to enable the
/// `TnId` Axum extractor.
#[async_trait]
pub trait TnIdResolver: Send + Sync {
	async fn resolve_tn_id(&self, id_tag: &str) -> Result<TnId, Error>;
}

/// Blanket impl for `Arc<T>` so that `App = Arc<AppState>` works
/// when `AppState` implements `TnIdResolver`.
#[async_trait]
impl<T: TnIdResolver> TnIdResolver for Arc<T> {
	async fn resolve_tn_id(&self, id_tag: &str) -> Result<TnId, Error> {
		(**self).resolve_tn_id(id_tag).await
	}
}

impl<S> FromRequestParts<S> for TnId
where
	S: TnIdResolver + Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		if let Some(id_tag) = parts.extensions.get::<IdTag>().cloned() {
			state.resolve_tn_id(&id_tag.0).await.map_err(|_| Error::PermissionDenied)
		} else {
			Err(Error::PermissionDenied)
		}
	}
}

/// An already-authenticated request-scoped subject, set by session/bearer
/// middleware and read back by handlers that require a signed-in user
/// (distinct from the OAuth `Client` acting as itself under
/// `client_credentials`).
#[derive(Clone, Debug)]
pub struct Auth(pub AuthCtx);

#[derive(Clone, Debug)]
pub struct AuthCtx {
	pub tenant_id: Option<TnId>,
	pub subject_id: String,
	pub session_id: Option<String>,
	pub amr: Vec<String>,
}

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts
			.extensions
			.get::<AuthCtx>()
			.cloned()
			.map(Auth)
			.ok_or(Error::Unauthorized)
	}
}

/// Optional variant, used by endpoints that behave differently when a
/// session happens to be present (e.g. the authorize endpoint deciding
/// whether a journey needs to run at all).
#[derive(Clone, Debug)]
pub struct OptionalAuth(pub Option<AuthCtx>);

impl<S> FromRequestParts<S> for OptionalAuth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(OptionalAuth(parts.extensions.get::<AuthCtx>().cloned()))
	}
}

// vim: ts=4
