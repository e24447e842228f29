//! Key lifecycle settings registration (§4.4, §5 "All are overridable
//! per tenant and per client").

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("keys.rotation_lead_seconds")
			.description("How long before a signing key's not_after the rotation task creates its successor")
			.default(SettingValue::Int(14 * 24 * 3600))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("keys.jwks_grace_seconds")
			.description("How long a retired signing key stays published in the JWKS after its not_after, so in-flight tokens still validate")
			.default(SettingValue::Int(7 * 24 * 3600))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("keys.validity_days")
			.description("Lifetime in days given to a newly generated signing key's not_after")
			.default(SettingValue::Int(90))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
