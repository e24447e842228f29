//! Ldap step handler (§4.2): "authenticates via directory bind, maps
//! returned groups to roles, provisions a local user if `auto_provision`
//! and none exists, emits auth events." Client-bind only — there is no
//! standalone LDAP directory front-end in this crate (see SPEC_FULL.md
//! §0 scope decision).

use async_trait::async_trait;
use serde_json::json;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;
use idplat_types::types::{DataMap, User};

pub struct Ldap;

#[async_trait]
impl StepHandler for Ldap {
	fn step_type(&self) -> &'static str {
		"ldap"
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
			_ => return Ok(StepHandlerResult::RequireInput("_Ldap".into(), json!({}))),
		};

		let Some(bind_dn_template) = ctx.config_str("bind_dn_template") else {
			return Ok(StepHandlerResult::Fail("step_config_error".into(), "ldap step missing bind_dn_template".into()));
		};
		let bind_dn = bind_dn_template.replace("{username}", username);

		let groups = ldap_bind_and_fetch_groups(&bind_dn, password).await?;

		let auto_provision = ctx.config_bool("auto_provision", false);
		let user = match ctx.app.user_store.find_user(ctx.tenant_id, username).await {
			Ok(user) => user,
			Err(Error::NotFound) if auto_provision => {
				let user = User {
					subject_id: idplat_types::utils::random_handle()?,
					tenant_id: ctx.tenant_id,
					username: username.to_string(),
					password_hash: None,
					mfa_enabled: false,
					totp_secret: None,
					groups: groups.clone(),
				};
				ctx.app.user_store.provision_user(user.clone()).await?;
				user
			}
			Err(e) => return Err(e),
		};

		*ctx.user_id = Some(user.subject_id.clone());
		ctx.amr.push("ldap".into());

		let mut outputs = DataMap::new();
		outputs.insert("ldap_groups".into(), json!(groups));
		Ok(StepHandlerResult::Success(outputs))
	}
}

/// Directory bind is an external-IO operation; a real deployment plugs
/// in a bind client here. Left as a `NotImplemented`-shaped stub since
/// no LDAP client crate is part of this crate's dependency stack.
async fn ldap_bind_and_fetch_groups(_bind_dn: &str, _password: &str) -> ClResult<Vec<String>> {
	Err(Error::ServiceUnavailable("ldap bind transport not configured".into()))
}

// vim: ts=4
