//! LocalLogin step handler (§4.2): "reads username/password from user
//! input; validates against user service; on success sets
//! context.user_id, auth_time, AMR=[\"pwd\"]. On empty input, returns
//! RequireInput(\"_LocalLogin\")".

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use async_trait::async_trait;
use serde_json::json;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;

pub struct LocalLogin;

#[async_trait]
impl StepHandler for LocalLogin {
	fn step_type(&self) -> &'static str {
		"local_login"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let username = ctx.user_input.get("username").and_then(|v| v.as_str());
		let password = ctx.user_input.get("password").and_then(|v| v.as_str());

		let (username, password) = match (username, password) {
			(Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
			_ => return Ok(StepHandlerResult::RequireInput("_LocalLogin".into(), json!({}))),
		};

		let user = ctx.app.user_store.find_user(ctx.tenant_id, username).await?;
		let Some(hash) = user.password_hash.as_deref() else {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "no password credential on file".into()));
		};

		if !verify_password(password, hash) {
			return Ok(StepHandlerResult::Fail("access_denied".into(), "invalid username or password".into()));
		}

		*ctx.user_id = Some(user.subject_id.clone());
		ctx.amr.push("pwd".into());

		let mut outputs = idplat_types::types::DataMap::new();
		outputs.insert("auth_time".into(), json!(Timestamp::now().0));
		outputs.insert("user".into(), json!({"mfa_enabled": user.mfa_enabled, "subject_id": user.subject_id}));
		Ok(StepHandlerResult::Success(outputs))
	}
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(stored_hash) else { return false };
	Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

// vim: ts=4
