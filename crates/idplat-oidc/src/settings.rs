//! OIDC protocol settings: PKCE enforcement and the lifetimes of the
//! short-lived protocol artifacts the authorize/PAR/CIBA/device
//! endpoints mint ahead of a token (§4.5, §6).

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("oidc.authorization_code_lifetime_seconds")
			.description("Authorization code validity window")
			.default(SettingValue::Int(60))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.pkce_required_for_native_clients")
			.description("Require PKCE on every authorization_code request from a native client")
			.default(SettingValue::Bool(true))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.par_lifetime_seconds")
			.description("Pushed authorization request validity window")
			.default(SettingValue::Int(60))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.ciba_lifetime_seconds")
			.description("CIBA backchannel authentication request validity window")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.ciba_polling_interval_seconds")
			.description("Minimum interval between CIBA token-endpoint polls")
			.default(SettingValue::Int(5))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.device_code_lifetime_seconds")
			.description("Device authorization request validity window")
			.default(SettingValue::Int(600))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("oidc.device_polling_interval_seconds")
			.description("Minimum interval between device-flow token-endpoint polls")
			.default(SettingValue::Int(5))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
