//! Claims providers (§4.3 point 4: "claims from registered claims
//! providers, invoked with a context carrying subject, client, scopes,
//! tenant"), registered into `AppState` the way the teacher registers
//! type-erased callbacks as extensions (`cloudillo-core::app`'s
//! `ActionVerifyFn` etc.) — except here the contract is a real trait
//! since every implementation shares the same shape.

use async_trait::async_trait;
use serde_json::{Map, Value};

use idplat_types::prelude::*;
use idplat_types::types::TnId;

pub struct ClaimsContext {
	pub subject_id: Option<String>,
	pub client_id: String,
	pub scopes: Vec<String>,
	pub tenant_id: Option<TnId>,
}

#[async_trait]
pub trait ClaimsProvider: Send + Sync {
	async fn claims(&self, ctx: &ClaimsContext) -> ClResult<Map<String, Value>>;
}

// vim: ts=4
