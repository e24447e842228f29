//! Userinfo endpoint (`/connect/userinfo`, §4.5 point 5, §6): resolves
//! the bearer access token back to claims and returns the subset the
//! client's granted scopes entitle it to.

use serde_json::{Map, Value};

use crate::prelude::*;

pub async fn userinfo(app: &App, bearer_token: &str) -> ClResult<Map<String, Value>> {
	let claims = idplat_token::service::introspect_access_token(app, bearer_token).await?;
	let Some(sub) = claims.get("sub").and_then(Value::as_str).map(str::to_string) else {
		return Err(Error::Unauthorized);
	};

	let scopes: Vec<String> = claims
		.get("scope")
		.and_then(Value::as_array)
		.map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
		.unwrap_or_default();
	if !scopes.iter().any(|s| s == "openid") {
		return Err(Error::Unauthorized);
	}

	let mut result = Map::new();
	result.insert("sub".into(), Value::String(sub));
	for (key, value) in &claims {
		if matches!(key.as_str(), "profile" | "email" | "address" | "phone") {
			result.insert(key.clone(), value.clone());
		}
	}
	Ok(result)
}

// vim: ts=4
