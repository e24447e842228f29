//! SAML protocol settings: assertion validity window, clock-skew
//! tolerance, and the NameID format the IdP issues by default (§4.6).

use idplat_core::settings::{PermissionLevel, SettingDefinition, SettingScope, SettingValue, SettingsRegistry};

use crate::prelude::*;

pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("saml.assertion_lifetime_seconds")
			.description("Validity window stamped into an Assertion's Conditions NotBefore/NotOnOrAfter")
			.default(SettingValue::Int(300))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("saml.clock_skew_seconds")
			.description("Tolerance applied when an SP validates an Assertion's Conditions window")
			.default(SettingValue::Int(60))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("saml.name_id_format")
			.description("Default NameID format the IdP issues when the AuthnRequest's NameIDPolicy does not request one")
			.default(SettingValue::Str("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".into()))
			.scope(SettingScope::Client)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("saml.request_lifetime_seconds")
			.description("How long an inbound AuthnRequest's correlation state is retained pending journey completion")
			.default(SettingValue::Int(600))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("saml.sp.idp_sso_url")
			.description("SSO endpoint of the external IdP this tenant trusts when acting as an SP")
			.default(SettingValue::Str(String::new()))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("saml.sp.idp_certificate_base64")
			.description("Base64 DER of the external IdP's signing certificate, used to verify inbound Responses")
			.default(SettingValue::Str(String::new()))
			.scope(SettingScope::Tenant)
			.permission(PermissionLevel::Admin)
			.build()?,
	)?;

	Ok(())
}

// vim: ts=4
