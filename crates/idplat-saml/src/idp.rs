//! IdP role (§4.6 "IdP"): parses an inbound `AuthnRequest`, dispatches a
//! `SignIn` journey, and on completion builds a signed
//! `<samlp:Response>`/`<saml:Assertion>` returned as an auto-posting HTML
//! form targeting the SP's ACS URL.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use idplat_journey::orchestrator::{self, JourneyContext, JourneyResult};
use idplat_types::condition::MatchContext;
use idplat_types::types::{Client, DataMap, JourneyType, ProtocolState};
use idplat_types::utils::random_handle;

use crate::binding::{auto_post_form, decode_post, decode_redirect, encode_post};
use crate::claims::resolve_claims;
use crate::prelude::*;
use crate::sign;
use crate::xml::{escape, parse_authn_request};

const SIGNING_ALGORITHM: &str = "RS256";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSsoRequest {
	request_id: String,
	acs_url: String,
	name_id_format: Option<String>,
	relay_state: Option<String>,
}

#[derive(Debug)]
pub enum SsoOutcome {
	Interaction { journey_id: String, view_name: String, view_model: Value },
	PostForm { html: String },
}

fn format_timestamp(ts: Timestamp) -> String {
	ts.to_chrono().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

async fn resolve_acs(client: &Client, requested: Option<&str>) -> ClResult<String> {
	match requested {
		Some(url) => {
			if client.redirect_uris.iter().any(|u| u == url) {
				Ok(url.to_string())
			} else {
				Err(Error::RedirectUriMismatch)
			}
		}
		None => client.redirect_uris.first().cloned().ok_or_else(|| Error::InvalidRequest("SP has no registered ACS URL".into())),
	}
}

async fn start_sso(app: &App, tenant_id: Option<TnId>, issuer: &str, xml: &str, relay_state: Option<String>) -> ClResult<SsoOutcome> {
	let info = parse_authn_request(xml)?;
	let client = app.client_store.find_client(tenant_id, &info.issuer).await.map_err(|_| Error::InvalidClient(info.issuer.clone()))?;

	if let Some(destination) = &info.destination {
		// Destination is the IdP's own SSO URL; mismatches are logged but not
		// fatal since the configured external path is not known to this crate.
		debug!("AuthnRequest destination: {destination}");
	}

	let acs_url = resolve_acs(&client, info.assertion_consumer_service_url.as_deref()).await?;

	let correlation_id = random_handle()?;
	let mut additional_parameters = DataMap::new();
	if let Some(format) = &info.name_id_format {
		additional_parameters.insert("name_id_format".into(), Value::String(format.clone()));
	}

	let stored = StoredSsoRequest { request_id: info.id.clone(), acs_url: acs_url.clone(), name_id_format: info.name_id_format.clone(), relay_state };
	app.protocol_state_store
		.put_state(ProtocolState {
			correlation_id: correlation_id.clone(),
			protocol_name: "saml".into(),
			serialized_request: serde_json::to_string(&stored).map_err(|e| Error::Internal(format!("SAML request state serialization failed: {e}")))?,
			client_id: client.client_id.clone(),
			endpoint_type: "sso".into(),
			properties: DataMap::new(),
			expires_at: Timestamp::now().plus_seconds(app.settings.get_i64(tenant_id, Some(&client.client_id), "saml.request_lifetime_seconds", 600)),
		})
		.await?;

	let ctx = JourneyContext {
		tenant_id,
		client: client.clone(),
		journey_type: JourneyType::SignIn,
		scopes: vec![],
		acr_values: vec![],
		additional_parameters,
		correlation_id: correlation_id.clone(),
	};
	let result = orchestrator::start(app, ctx).await?;
	finish(app, tenant_id, issuer, &client, &correlation_id, result).await
}

pub async fn sso_redirect(app: &App, tenant_id: Option<TnId>, issuer: &str, saml_request: &str, relay_state: Option<String>) -> ClResult<SsoOutcome> {
	let xml = decode_redirect(saml_request)?;
	start_sso(app, tenant_id, issuer, &xml, relay_state).await
}

pub async fn sso_post(app: &App, tenant_id: Option<TnId>, issuer: &str, saml_request: &str, relay_state: Option<String>) -> ClResult<SsoOutcome> {
	let xml = decode_post(saml_request)?;
	start_sso(app, tenant_id, issuer, &xml, relay_state).await
}

pub async fn continue_sso(app: &App, tenant_id: Option<TnId>, issuer: &str, journey_id: &str, step_id: &str, input: DataMap) -> ClResult<SsoOutcome> {
	let journey = app.journey_state_store.find_state(journey_id).await?;
	let client = app.client_store.find_client(tenant_id, &journey.client_id).await?;
	let result = orchestrator::r#continue(app, journey_id, orchestrator::JourneyStepInput { step_id: step_id.to_string(), input }).await?;
	finish(app, tenant_id, issuer, &client, &journey.correlation_id, result).await
}

async fn finish(app: &App, tenant_id: Option<TnId>, issuer: &str, client: &Client, correlation_id: &str, result: JourneyResult) -> ClResult<SsoOutcome> {
	match result {
		JourneyResult::AwaitingInput { journey_id, view_name, view_model } => Ok(SsoOutcome::Interaction { journey_id, view_name, view_model }),
		JourneyResult::Failed { description, .. } => {
			app.protocol_state_store.consume_state(correlation_id).await.ok();
			Err(Error::AccessDenied(description))
		}
		JourneyResult::Completed { journey_data, user_id, amr, .. } => {
			let state = app.protocol_state_store.consume_state(correlation_id).await?;
			let stored: StoredSsoRequest =
				serde_json::from_str(&state.serialized_request).map_err(|e| Error::Internal(format!("stored SAML request is corrupt: {e}")))?;
			let subject_id = user_id.ok_or_else(|| Error::ServerError("journey completed with no authenticated subject".into()))?;

			let match_ctx = MatchContext {
				tenant_id,
				client_id: client.client_id.clone(),
				journey_type: JourneyType::SignIn,
				scopes: vec![],
				acr_values: vec![],
				additional_parameters: DataMap::new(),
			};
			let policy = app.policy_store.find_matching(&match_ctx).await?;
			let attributes = policy.map(|p| resolve_claims(&journey_data, &p.output_claims)).unwrap_or_default();

			let html = build_response(app, tenant_id, issuer, client, &stored, &subject_id, &amr, &attributes).await?;
			Ok(SsoOutcome::PostForm { html })
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn build_response(
	app: &App,
	tenant_id: Option<TnId>,
	issuer: &str,
	client: &Client,
	stored: &StoredSsoRequest,
	subject_id: &str,
	amr: &[String],
	attributes: &[(String, String)],
) -> ClResult<String> {
	let key = app.signing_store.active_key(tenant_id, SIGNING_ALGORITHM).await?;
	let encryption = app.ext::<std::sync::Arc<dyn idplat_keys::encryption::EncryptionService>>()?;

	let lifetime = app.settings.get_i64(tenant_id, Some(&client.client_id), "saml.assertion_lifetime_seconds", 300);
	let now = Timestamp::now();
	let not_before = now;
	let not_on_or_after = now.plus_seconds(lifetime);

	let assertion_id = format!("_{}", random_handle()?);
	let response_id = format!("_{}", random_handle()?);
	let issue_instant = format_timestamp(now);

	let name_id_format = stored
		.name_id_format
		.clone()
		.unwrap_or_else(|| app.settings.get(tenant_id, Some(&client.client_id), "saml.name_id_format").ok().flatten().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".into()));

	let authn_context = if amr.iter().any(|a| a == "mfa" || a == "otp") {
		"urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
	} else {
		"urn:oasis:names:tc:SAML:2.0:ac:classes:Password"
	};

	let attribute_statement = if attributes.is_empty() {
		String::new()
	} else {
		let mut buf = String::from("<saml:AttributeStatement>");
		for (name, value) in attributes {
			buf.push_str(&format!(
				"<saml:Attribute Name=\"{}\"><saml:AttributeValue xsi:type=\"xs:string\">{}</saml:AttributeValue></saml:Attribute>",
				escape(name),
				escape(value),
			));
		}
		buf.push_str("</saml:AttributeStatement>");
		buf
	};

	let assertion_unsigned = format!(
		"<saml:Assertion xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xmlns:xs=\"http://www.w3.org/2001/XMLSchema\" ID=\"{assertion_id}\" IssueInstant=\"{issue_instant}\" Version=\"2.0\">\
		<saml:Issuer>{issuer}</saml:Issuer>\
		<saml:Subject>\
			<saml:NameID Format=\"{name_id_format}\">{subject}</saml:NameID>\
			<saml:SubjectConfirmation Method=\"urn:oasis:names:tc:SAML:2.0:cm:bearer\">\
				<saml:SubjectConfirmationData InResponseTo=\"{in_response_to}\" NotOnOrAfter=\"{not_on_or_after}\" Recipient=\"{acs_url}\"/>\
			</saml:SubjectConfirmation>\
		</saml:Subject>\
		<saml:Conditions NotBefore=\"{not_before}\" NotOnOrAfter=\"{not_on_or_after}\">\
			<saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction>\
		</saml:Conditions>\
		<saml:AuthnStatement AuthnInstant=\"{issue_instant}\" SessionIndex=\"{assertion_id}\">\
			<saml:AuthnContext><saml:AuthnContextClassRef>{authn_context}</saml:AuthnContextClassRef></saml:AuthnContext>\
		</saml:AuthnStatement>\
		{attribute_statement}\
		</saml:Assertion>",
		assertion_id = assertion_id,
		issue_instant = issue_instant,
		issuer = escape(issuer),
		name_id_format = escape(&name_id_format),
		subject = escape(subject_id),
		in_response_to = escape(&stored.request_id),
		not_on_or_after = not_on_or_after.to_chrono().format("%Y-%m-%dT%H:%M:%SZ"),
		not_before = not_before.to_chrono().format("%Y-%m-%dT%H:%M:%SZ"),
		acs_url = escape(&stored.acs_url),
		audience = escape(&client.client_id),
		authn_context = authn_context,
		attribute_statement = attribute_statement,
	);

	let digest = sign::digest_base64(assertion_unsigned.as_bytes());
	let signature_value = sign::sign_base64(&key, encryption.as_ref(), assertion_unsigned.as_bytes())?;
	let certificate = sign::certificate_base64(&key)?;

	let signature_block = format!(
		"<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\
			<ds:SignedInfo>\
				<ds:CanonicalizationMethod Algorithm=\"{c14n}\"/>\
				<ds:SignatureMethod Algorithm=\"{sigmeth}\"/>\
				<ds:Reference URI=\"#{assertion_id}\">\
					<ds:Transforms>\
						<ds:Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"/>\
					</ds:Transforms>\
					<ds:DigestMethod Algorithm=\"{digmeth}\"/>\
					<ds:DigestValue>{digest}</ds:DigestValue>\
				</ds:Reference>\
			</ds:SignedInfo>\
			<ds:SignatureValue>{signature_value}</ds:SignatureValue>\
			<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>\
		</ds:Signature>",
		c14n = sign::CANONICALIZATION_EXC_C14N,
		sigmeth = sign::SIGNATURE_METHOD_RSA_SHA256,
		digmeth = sign::DIGEST_METHOD_SHA256,
		assertion_id = assertion_id,
		digest = digest,
		signature_value = signature_value,
		certificate = certificate,
	);

	// enveloped signature: spliced in right after Issuer, before Subject
	let assertion_final = assertion_unsigned.replacen(
		&format!("<saml:Issuer>{}</saml:Issuer>", escape(issuer)),
		&format!("<saml:Issuer>{}</saml:Issuer>{}", escape(issuer), signature_block),
		1,
	);

	let response = format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
		<samlp:Response xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" ID=\"{response_id}\" InResponseTo=\"{in_response_to}\" Version=\"2.0\" IssueInstant=\"{issue_instant}\" Destination=\"{acs_url}\">\
			<saml:Issuer xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\">{issuer}</saml:Issuer>\
			<samlp:Status><samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"/></samlp:Status>\
			{assertion}\
		</samlp:Response>",
		response_id = response_id,
		in_response_to = escape(&stored.request_id),
		issue_instant = issue_instant,
		acs_url = escape(&stored.acs_url),
		issuer = escape(issuer),
		assertion = assertion_final,
	);

	Ok(auto_post_form(&stored.acs_url, "SAMLResponse", &encode_post(&response), stored.relay_state.as_deref()))
}

// vim: ts=4
