//! Consent step handler (§4.2): resolves requested scopes, checks
//! persisted consent, and on decision either persists the grant and
//! records `consented_scopes` in journey data, or fails with
//! `access_denied`.

use async_trait::async_trait;
use serde_json::json;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;
use idplat_types::types::{Consent, DataMap};

pub struct ConsentHandler;

#[async_trait]
impl StepHandler for ConsentHandler {
	fn step_type(&self) -> &'static str {
		"consent"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let Some(subject_id) = ctx.user_id.clone() else {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "consent requires an authenticated subject".into()));
		};

		let requested_scopes: Vec<String> = ctx
			.journey_data
			.get("requested_scopes")
			.and_then(|v| v.as_array())
			.map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
			.unwrap_or_default();

		if !ctx.client.require_consent {
			let mut outputs = DataMap::new();
			outputs.insert("consented_scopes".into(), json!(requested_scopes));
			return Ok(StepHandlerResult::Success(outputs));
		}

		let existing =
			ctx.app.consent_store.find_consent(ctx.tenant_id, &subject_id, &ctx.client.client_id).await?;
		if let Some(consent) = existing {
			let now = Timestamp::now();
			let still_valid = consent.expires_at.is_none_or(|exp| !exp.is_past(now));
			let covers_all = requested_scopes.iter().all(|s| consent.granted_scopes.contains(s));
			if still_valid && covers_all {
				let mut outputs = DataMap::new();
				outputs.insert("consented_scopes".into(), json!(requested_scopes));
				return Ok(StepHandlerResult::Success(outputs));
			}
		}

		let Some(decision) = ctx.user_input.get("decision").and_then(|v| v.as_str()) else {
			return Ok(StepHandlerResult::RequireInput(
				"_Consent".into(),
				json!({"requested_scopes": requested_scopes}),
			));
		};

		if decision != "allow" {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "user denied consent".into()));
		}

		let remember = ctx.user_input.get("remember_consent").and_then(|v| v.as_bool()).unwrap_or(false);
		if remember && ctx.client.allow_remember_consent {
			let now = Timestamp::now();
			let consent = Consent {
				subject_id: subject_id.clone(),
				client_id: ctx.client.client_id.clone(),
				tenant_id: ctx.tenant_id,
				granted_scopes: requested_scopes.iter().cloned().collect(),
				created_at: now,
				expires_at: ctx.client.consent_lifetime_secs.map(|secs| now.plus_seconds(secs)),
			};
			ctx.app.consent_store.put_consent(consent).await?;
		}

		let mut outputs = DataMap::new();
		outputs.insert("consented_scopes".into(), json!(requested_scopes));
		Ok(StepHandlerResult::Success(outputs))
	}
}

// vim: ts=4
