//! Tenant & Issuer Resolution (§4.7).
//!
//! Tenant is resolved in order: explicit `X-Tenant-Id` header (validated
//! against the authenticated principal's own tenant for account APIs),
//! `tenant_id` claim in the bearer token, the client's bound tenant,
//! host-based mapping. A request without a resolved tenant may still
//! reach platform endpoints (discovery, JWKS, CORS preflight) but is
//! rejected from tenant-scoped data.
//!
//! Issuer URI is resolved in order: tenant token settings, tenant custom
//! domain, platform-configured issuer, request scheme+host — always
//! trimmed of a trailing slash.

use idplat_core::settings::SettingValue;
use idplat_types::extract::AuthCtx;
use idplat_types::types::Client;

use crate::prelude::*;

pub const TENANT_ID_HEADER: &str = "X-Tenant-Id";

pub struct TenantResolutionInput<'a> {
	pub header_tenant_id: Option<&'a str>,
	pub bearer_tenant_id: Option<TnId>,
	pub client: Option<&'a Client>,
	pub host_tenant_id: Option<TnId>,
	pub authenticated: Option<&'a AuthCtx>,
}

/// Resolves the effective tenant for a request; `None` means
/// platform-global scope.
pub fn resolve_tenant(input: &TenantResolutionInput<'_>) -> ClResult<Option<TnId>> {
	if let Some(header_value) = input.header_tenant_id {
		let requested: TnId = header_value
			.parse::<i64>()
			.map(TnId)
			.map_err(|_| Error::InvalidRequest("X-Tenant-Id header is not a valid tenant id".into()))?;
		if let Some(auth) = input.authenticated {
			if auth.tenant_id != Some(requested) {
				return Err(Error::PermissionDenied);
			}
		}
		return Ok(Some(requested));
	}

	if let Some(tenant_id) = input.bearer_tenant_id {
		return Ok(Some(tenant_id));
	}

	if let Some(client) = input.client {
		if let Some(tenant_id) = client.tenant_id {
			return Ok(Some(tenant_id));
		}
	}

	Ok(input.host_tenant_id)
}

/// Resolves the issuer URI that will appear verbatim in minted tokens
/// and the discovery document.
pub async fn resolve_issuer(app: &App, tenant_id: Option<TnId>, request_scheme_host: &str) -> ClResult<String> {
	if let Some(SettingValue::Str(issuer)) = app.settings.get(tenant_id, None, "token.issuer_uri")? {
		if !issuer.is_empty() {
			return Ok(trim_trailing_slash(&issuer));
		}
	}

	if let Some(SettingValue::Str(domain)) = app.settings.get(tenant_id, None, "tenant.custom_domain")? {
		if !domain.is_empty() {
			return Ok(trim_trailing_slash(&format!("https://{domain}")));
		}
	}

	if let Some(issuer) = app.opts.platform_issuer.as_deref() {
		if !issuer.is_empty() {
			return Ok(trim_trailing_slash(issuer));
		}
	}

	Ok(trim_trailing_slash(request_scheme_host))
}

fn trim_trailing_slash(s: &str) -> String {
	s.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_requires_match_with_authenticated_tenant() {
		let auth = AuthCtx { tenant_id: Some(TnId(2)), subject_id: "u1".into(), session_id: None, amr: vec![] };
		let input = TenantResolutionInput {
			header_tenant_id: Some("1"),
			bearer_tenant_id: None,
			client: None,
			host_tenant_id: None,
			authenticated: Some(&auth),
		};
		assert!(matches!(resolve_tenant(&input), Err(Error::PermissionDenied)));
	}

	#[test]
	fn falls_back_through_client_then_host() {
		let client = Client {
			client_id: "c1".into(),
			tenant_id: Some(TnId(7)),
			client_secrets: vec![],
			allowed_grant_types: Default::default(),
			redirect_uris: vec![],
			post_logout_redirect_uris: vec![],
			cors_origins: vec![],
			allowed_scopes: Default::default(),
			access_token_lifetime_secs: None,
			id_token_lifetime_secs: None,
			refresh_token_lifetime_secs: None,
			require_consent: false,
			allow_remember_consent: false,
			consent_lifetime_secs: None,
			ciba_enabled: false,
			is_native_client: false,
		};
		let input = TenantResolutionInput {
			header_tenant_id: None,
			bearer_tenant_id: None,
			client: Some(&client),
			host_tenant_id: Some(TnId(9)),
			authenticated: None,
		};
		assert_eq!(resolve_tenant(&input).unwrap(), Some(TnId(7)));
	}
}

// vim: ts=4
