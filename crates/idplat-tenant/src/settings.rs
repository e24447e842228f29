//! Tenant & issuer resolution settings registration (§4.7).

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("token.issuer_uri")
			.description("Issuer URI stamped into minted tokens and the discovery document; overrides custom domain and request host")
			.default(SettingValue::Str(String::new()))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("tenant.custom_domain")
			.description("Custom domain this tenant is reachable under; used to derive the issuer URI when no explicit issuer is set")
			.default(SettingValue::Str(String::new()))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
