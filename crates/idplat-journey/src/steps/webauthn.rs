//! WebAuthn step handlers (§4.2): "parses an attestation object for
//! registration or an assertion for authentication per RFC 8812 and the
//! WebAuthn spec ... counter advances monotonically unless the
//! authenticator reports zero."
//!
//! Grounded on the teacher's passkey registration/authentication flow
//! (build a per-RP `Webauthn` instance, `start_passkey_registration` /
//! `start_passkey_authentication`, then the matching `finish_*` call) —
//! restructured from a pair of HTTP handlers into a pair of step
//! handlers that suspend with `RequireInput` between the challenge and
//! its response, carrying the serialized ceremony state in
//! `journey_data` rather than a signed JWT side-channel.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use webauthn_rs::prelude::*;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;
use idplat_types::types::DataMap;

const STATE_KEY: &str = "_webauthn_state";

fn build_webauthn(rp_id: &str) -> ClResult<Webauthn> {
	let rp_origin = Url::parse(&format!("https://{rp_id}"))
		.map_err(|_| Error::Internal("invalid webauthn rp origin".into()))?;
	WebauthnBuilder::new(rp_id, &rp_origin)
		.map_err(|e| Error::Internal(format!("webauthn builder error: {e:?}")))?
		.rp_name(rp_id)
		.build()
		.map_err(|e| Error::Internal(format!("webauthn build error: {e:?}")))
}

fn rp_id_for(ctx: &StepExecutionContext<'_>) -> String {
	ctx.config_str("rp_id").map(str::to_string).unwrap_or_else(|| ctx.client.client_id.clone())
}

pub struct WebAuthnRegister;

#[async_trait]
impl StepHandler for WebAuthnRegister {
	fn step_type(&self) -> &'static str {
		"webauthn_register"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let Some(subject_id) = ctx.user_id.clone() else {
			return Ok(StepHandlerResult::Fail(
				"access_denied".into(),
				"webauthn registration requires an authenticated subject".into(),
			));
		};

		if let Some(response_json) = ctx.user_input.get("response") {
			let Some(state_json) = ctx.journey_data.get(STATE_KEY).and_then(|v| v.as_str()) else {
				return Ok(StepHandlerResult::Fail("step_config_error".into(), "no pending registration ceremony".into()));
			};
			let reg_state: PasskeyRegistration = serde_json::from_str(state_json)
				.map_err(|e| Error::Internal(format!("corrupt registration state: {e}")))?;
			let response: RegisterPublicKeyCredential = serde_json::from_value(response_json.clone())
				.map_err(|_| Error::InvalidRequest("malformed webauthn registration response".into()))?;

			let webauthn = build_webauthn(&rp_id_for(ctx))?;
			let passkey = webauthn
				.finish_passkey_registration(&response, &reg_state)
				.map_err(|e| Error::AccessDenied(format!("webauthn registration rejected: {e:?}")))?;

			let cred_id = URL_SAFE_NO_PAD.encode(passkey.cred_id());
			let passkey_json = serde_json::to_string(&passkey)
				.map_err(|e| Error::Internal(format!("failed to serialize passkey: {e}")))?;

			let mut outputs = DataMap::new();
			outputs.insert("webauthn_credential_id".into(), json!(cred_id));
			outputs.insert("webauthn_credential".into(), json!(passkey_json));
			outputs.insert(STATE_KEY.into(), serde_json::Value::Null);
			return Ok(StepHandlerResult::Success(outputs));
		}

		let webauthn = build_webauthn(&rp_id_for(ctx))?;
		let user_uuid = Uuid::new_v4();
		let (ccr, reg_state) = webauthn
			.start_passkey_registration(user_uuid, &subject_id, &subject_id, None)
			.map_err(|e| Error::Internal(format!("webauthn start_passkey_registration error: {e:?}")))?;

		let state_json = serde_json::to_string(&reg_state)
			.map_err(|e| Error::Internal(format!("failed to serialize registration state: {e}")))?;
		ctx.journey_data.insert(STATE_KEY.into(), json!(state_json));

		let ccr_json = serde_json::to_value(&ccr).map_err(|e| Error::Internal(format!("failed to serialize challenge: {e}")))?;
		let options = ccr_json.get("publicKey").cloned().unwrap_or(ccr_json);
		Ok(StepHandlerResult::RequireInput("_WebAuthnRegister".into(), json!({"options": options})))
	}
}

pub struct WebAuthnAuthenticate;

#[async_trait]
impl StepHandler for WebAuthnAuthenticate {
	fn step_type(&self) -> &'static str {
		"webauthn_authenticate"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		if let Some(response_json) = ctx.user_input.get("response") {
			let Some(state_json) = ctx.journey_data.get(STATE_KEY).and_then(|v| v.as_str()) else {
				return Ok(StepHandlerResult::Fail("step_config_error".into(), "no pending authentication ceremony".into()));
			};
			let auth_state: PasskeyAuthentication = serde_json::from_str(state_json)
				.map_err(|e| Error::Internal(format!("corrupt authentication state: {e}")))?;
			let response: PublicKeyCredential = serde_json::from_value(response_json.clone())
				.map_err(|_| Error::InvalidRequest("malformed webauthn authentication response".into()))?;

			let webauthn = build_webauthn(&rp_id_for(ctx))?;
			let result = webauthn
				.finish_passkey_authentication(&response, &auth_state)
				.map_err(|e| Error::AccessDenied(format!("webauthn authentication rejected: {e:?}")))?;

			// §9 open question: leniency preserved verbatim — warn, don't reject,
			// when the authenticator's counter didn't advance.
			if result.counter() == 0 {
				warn!("webauthn credential reported a zero counter; some authenticators don't implement counters");
			}

			let cred_id = URL_SAFE_NO_PAD.encode(result.cred_id());
			let Some(subject_id) =
				ctx.journey_data.get("webauthn_subject_for_credential").and_then(|v| v.as_str()).map(str::to_string)
			else {
				return Ok(StepHandlerResult::Fail("step_config_error".into(), "no subject bound to credential".into()));
			};

			*ctx.user_id = Some(subject_id);
			ctx.amr.push("webauthn".into());

			let mut outputs = DataMap::new();
			outputs.insert("webauthn_credential_id".into(), json!(cred_id));
			outputs.insert("webauthn_counter".into(), json!(result.counter()));
			outputs.insert(STATE_KEY.into(), serde_json::Value::Null);
			return Ok(StepHandlerResult::Success(outputs));
		}

		let Some(subject_id) = ctx.user_input.get("subject_id").and_then(|v| v.as_str()).map(str::to_string) else {
			return Ok(StepHandlerResult::RequireInput("_WebAuthnAuthenticate".into(), json!({})));
		};

		let stored: Vec<String> = ctx
			.journey_data
			.get("webauthn_credentials")
			.and_then(|v| v.as_array())
			.map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
			.unwrap_or_default();
		let passkeys: Vec<Passkey> =
			stored.iter().filter_map(|s| serde_json::from_str::<Passkey>(s).ok()).collect();
		if passkeys.is_empty() {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "no registered passkeys".into()));
		}

		let webauthn = build_webauthn(&rp_id_for(ctx))?;
		let (rcr, auth_state) = webauthn
			.start_passkey_authentication(&passkeys)
			.map_err(|e| Error::Internal(format!("webauthn start_passkey_authentication error: {e:?}")))?;

		let state_json = serde_json::to_string(&auth_state)
			.map_err(|e| Error::Internal(format!("failed to serialize authentication state: {e}")))?;
		ctx.journey_data.insert(STATE_KEY.into(), json!(state_json));
		ctx.journey_data.insert("webauthn_subject_for_credential".into(), json!(subject_id));

		let rcr_json = serde_json::to_value(&rcr).map_err(|e| Error::Internal(format!("failed to serialize challenge: {e}")))?;
		let options = rcr_json.get("publicKey").cloned().unwrap_or(rcr_json);
		Ok(StepHandlerResult::RequireInput("_WebAuthnAuthenticate".into(), json!({"options": options})))
	}
}

// vim: ts=4
