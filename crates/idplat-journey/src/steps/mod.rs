//! Representative step handlers (§4.2 "Representative handlers").

pub mod consent;
pub mod ldap;
pub mod local_login;
pub mod mfa;
pub mod transform;
pub mod webauthn;
pub mod webhook;

use std::sync::Arc;

use idplat_core::step_handler::StepHandlerRegistry;

/// Registers every built-in handler under its `step_type` key.
pub fn register_all(registry: &mut StepHandlerRegistry) {
	registry.register(Arc::new(local_login::LocalLogin));
	registry.register(Arc::new(mfa::Mfa));
	registry.register(Arc::new(consent::ConsentHandler));
	registry.register(Arc::new(webauthn::WebAuthnRegister));
	registry.register(Arc::new(webauthn::WebAuthnAuthenticate));
	registry.register(Arc::new(ldap::Ldap));
	registry.register(Arc::new(webhook::Webhook));
	registry.register(Arc::new(transform::Transform));
}

// vim: ts=4
