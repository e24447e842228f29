//! SP role (§4.6 "SP (inbound)"): validates an inbound `<samlp:Response>`
//! from an external IdP — signature against the IdP's certificate,
//! `InResponseTo` against the caller's expected request ID, the
//! `<saml:Conditions>` validity window, and extracts `NameID`/attributes.
//!
//! A tenant acting as SP trusts a single external IdP, configured via the
//! `saml.sp.idp_sso_url`/`saml.sp.idp_certificate_base64` settings. There
//! is no dedicated SP metadata type; this crate's own issuer doubles as
//! the SP's entity ID.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use idplat_types::types::{DataMap, ProtocolState};
use idplat_types::utils::random_handle;

use crate::binding::{self, decode_post};
use crate::prelude::*;
use crate::sign;
use crate::xml::{self, ResponseInfo};

#[derive(Debug, Serialize, Deserialize)]
struct StoredSpLoginRequest {
	request_id: String,
	acs_url: String,
}

fn format_timestamp(ts: Timestamp) -> String {
	ts.to_chrono().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

async fn idp_sso_url(app: &App, tenant_id: Option<TnId>) -> ClResult<String> {
	let url = app.settings.get(tenant_id, None, "saml.sp.idp_sso_url")?.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
	if url.is_empty() {
		return Err(Error::ConfigError("this tenant has no saml.sp.idp_sso_url configured".into()));
	}
	Ok(url)
}

async fn idp_certificate_der(app: &App, tenant_id: Option<TnId>) -> ClResult<Vec<u8>> {
	let encoded = app.settings.get(tenant_id, None, "saml.sp.idp_certificate_base64")?.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
	if encoded.is_empty() {
		return Err(Error::ConfigError("this tenant has no saml.sp.idp_certificate_base64 configured".into()));
	}
	STANDARD.decode(&encoded).map_err(|e| Error::ConfigError(format!("saml.sp.idp_certificate_base64 is not valid base64: {e}")))
}

/// Begins an SP-initiated login: builds an `AuthnRequest`, persists its
/// ID for later `InResponseTo` validation, and returns the Redirect-binding
/// URL to send the browser to.
pub async fn initiate(app: &App, tenant_id: Option<TnId>, issuer: &str, acs_url: &str) -> ClResult<String> {
	let destination = idp_sso_url(app, tenant_id).await?;
	let request_id = format!("_{}", random_handle()?);

	let request_xml = format!(
		"<samlp:AuthnRequest xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\" ID=\"{id}\" Version=\"2.0\" IssueInstant=\"{instant}\" Destination=\"{destination}\" AssertionConsumerServiceURL=\"{acs_url}\" ProtocolBinding=\"urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST\">\
			<saml:Issuer>{issuer}</saml:Issuer>\
		</samlp:AuthnRequest>",
		id = request_id,
		instant = format_timestamp(Timestamp::now()),
		destination = xml::escape(&destination),
		acs_url = xml::escape(acs_url),
		issuer = xml::escape(issuer),
	);

	app.protocol_state_store
		.put_state(ProtocolState {
			correlation_id: request_id.clone(),
			protocol_name: "saml".into(),
			serialized_request: serde_json::to_string(&StoredSpLoginRequest { request_id: request_id.clone(), acs_url: acs_url.to_string() })
				.map_err(|e| Error::Internal(format!("SAML SP login state serialization failed: {e}")))?,
			client_id: String::new(),
			endpoint_type: "sp_login".into(),
			properties: DataMap::new(),
			expires_at: Timestamp::now().plus_seconds(app.settings.get_i64(tenant_id, None, "saml.request_lifetime_seconds", 600)),
		})
		.await?;

	let encoded = binding::encode_redirect(&request_xml)?;
	let mut url = url::Url::parse(&destination).map_err(|e| Error::ConfigError(format!("saml.sp.idp_sso_url is not a valid URL: {e}")))?;
	url.query_pairs_mut().append_pair("SAMLRequest", &encoded);
	Ok(url.to_string())
}

/// Handles the ACS POST: decodes the Response, looks up the pending
/// login this `InResponseTo` refers to, and validates it against the
/// tenant's configured IdP certificate.
pub async fn acs(app: &App, tenant_id: Option<TnId>, saml_response: &str) -> ClResult<ValidatedAssertion> {
	let xml = decode_post(saml_response)?;
	let info = xml::parse_response(&xml)?;
	let in_response_to = info.in_response_to.clone().ok_or_else(|| Error::InvalidRequest("SAML Response is missing InResponseTo".into()))?;

	let state = app.protocol_state_store.consume_state(&in_response_to).await.map_err(|_| Error::InvalidRequest("no outstanding SAML login matches this Response".into()))?;
	let stored: StoredSpLoginRequest = serde_json::from_str(&state.serialized_request).map_err(|e| Error::Internal(format!("stored SAML SP login state is corrupt: {e}")))?;

	let certificate_der = idp_certificate_der(app, tenant_id).await?;
	let clock_skew = app.settings.get_i64(tenant_id, None, "saml.clock_skew_seconds", 60);
	validate_response(&xml, &certificate_der, &stored.acs_url, &in_response_to, clock_skew)
}

/// A successfully validated inbound assertion, ready for the caller to
/// turn into a local session.
#[derive(Debug, Clone)]
pub struct ValidatedAssertion {
	pub name_id: String,
	pub issuer: String,
	pub attributes: Vec<(String, String)>,
}

fn parse_timestamp(value: &str) -> ClResult<Timestamp> {
	let dt = chrono::DateTime::parse_from_rfc3339(value).map_err(|e| Error::InvalidRequest(format!("malformed SAML timestamp '{value}': {e}")))?;
	Ok(Timestamp(dt.timestamp()))
}

/// Validates `xml` (already decoded from its POST-binding base64) as a
/// successful Response to the AuthnRequest identified by
/// `expected_in_response_to`, signed by the certificate `idp_certificate_der`,
/// targeting `expected_destination`.
pub fn validate_response(
	xml: &str,
	idp_certificate_der: &[u8],
	expected_destination: &str,
	expected_in_response_to: &str,
	clock_skew_seconds: i64,
) -> ClResult<ValidatedAssertion> {
	let info: ResponseInfo = xml::parse_response(xml)?;

	if info.status_code != "urn:oasis:names:tc:SAML:2.0:status:Success" {
		return Err(Error::AccessDenied(format!("SAML Response status was not Success: {}", info.status_code)));
	}

	if let Some(destination) = &info.destination {
		if destination != expected_destination {
			return Err(Error::InvalidRequest(format!("SAML Response Destination '{destination}' does not match the expected ACS URL")));
		}
	}

	match &info.in_response_to {
		Some(value) if value == expected_in_response_to => {}
		Some(value) => return Err(Error::InvalidRequest(format!("SAML Response InResponseTo '{value}' does not match the outstanding request"))),
		None => return Err(Error::InvalidRequest("SAML Response is missing InResponseTo".into())),
	}

	let signed_content = info.signed_content.as_deref().ok_or_else(|| Error::InvalidRequest("SAML Response carries no signed Assertion".into()))?;
	let signature_value = info.signature_value.as_deref().ok_or_else(|| Error::InvalidRequest("SAML Assertion is not signed".into()))?;
	sign::verify_base64_with_certificate(idp_certificate_der, signed_content.as_bytes(), signature_value)?;

	let now = Timestamp::now();
	if let Some(not_before) = &info.not_before {
		let not_before = parse_timestamp(not_before)?;
		if now.0 + clock_skew_seconds < not_before.0 {
			return Err(Error::AccessDenied("SAML assertion is not yet valid (NotBefore)".into()));
		}
	}
	if let Some(not_on_or_after) = &info.not_on_or_after {
		let not_on_or_after = parse_timestamp(not_on_or_after)?;
		if now.0 - clock_skew_seconds >= not_on_or_after.0 {
			return Err(Error::AccessDenied("SAML assertion has expired (NotOnOrAfter)".into()));
		}
	}

	let name_id = info.name_id.ok_or_else(|| Error::InvalidRequest("SAML Assertion is missing a NameID".into()))?;

	Ok(ValidatedAssertion { name_id, issuer: info.issuer, attributes: info.attributes })
}

// vim: ts=4
