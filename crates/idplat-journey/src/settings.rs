//! Journey orchestrator settings registration.

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("journey.signin_policy_id")
			.description("Default policy id matched for SignIn journeys when no explicit policy query parameter is given")
			.default(SettingValue::Str("signin-default".into()))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
