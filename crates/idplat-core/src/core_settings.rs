//! Registers the §5 default timeouts/lifetimes as tenant/client-overridable
//! settings.

use idplat_types::prelude::*;

use crate::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("journey.step_timeout_secs")
			.description("Default per-step timeout for journey step handlers")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("journey.max_duration_secs")
			.description("Default maximum journey duration")
			.default(SettingValue::Int(1800))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("protocol.state_ttl_secs")
			.description("Protocol state correlation record TTL")
			.default(SettingValue::Int(600))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("token.access_token_lifetime_secs")
			.description("Default access token lifetime")
			.default(SettingValue::Int(3600))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("token.id_token_lifetime_secs")
			.description("Default id token lifetime")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("token.refresh_token_lifetime_secs")
			.description("Default refresh token lifetime")
			.default(SettingValue::Int(2_592_000))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("keys.signing_credential_cache_ttl_secs")
			.description("How long the active signing credential may be cached per process")
			.default(SettingValue::Int(60))
			.scope(SettingScope::Global)
			.permission(PermissionLevel::Platform)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("cors.origin_cache_ttl_secs")
			.description("TTL for the cross-tenant CORS-origin cache")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Global)
			.permission(PermissionLevel::Platform)
			.build()?,
	)?;
	registry.register(
		SettingDefinition::builder("consent.default_lifetime_secs")
			.description("Default consent lifetime when a client does not override it")
			.default(SettingValue::Int(31_536_000))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
