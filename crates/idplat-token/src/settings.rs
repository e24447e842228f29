//! Token lifetime settings registration (§5 default lifetimes, all
//! overridable per tenant and per client).

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("token.access_token_lifetime_seconds")
			.description("Default access token lifetime")
			.default(SettingValue::Int(3600))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("token.id_token_lifetime_seconds")
			.description("Default id token lifetime")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("token.refresh_token_lifetime_seconds")
			.description("Default refresh token lifetime")
			.default(SettingValue::Int(2_592_000))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("token.default_algorithm")
			.description("Signing algorithm used to select the active signing key when a request doesn't pin one")
			.default(SettingValue::Str("RS256".into()))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("token.refresh_family_revocation")
			.description("Whether revoking a refresh token cascades to every descendant token minted from the same family")
			.default(SettingValue::Bool(true))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
