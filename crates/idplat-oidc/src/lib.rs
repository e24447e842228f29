//! OIDC/OAuth2 protocol service (§4.5): discovery, JWKS, the authorize
//! and token endpoints, userinfo, revocation, introspection,
//! end-session, pushed authorization requests, CIBA, and device code.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod authorize;
pub mod ciba;
pub mod client_auth;
pub mod device;
pub mod discovery;
pub mod end_session;
pub mod introspection;
pub mod pkce;
pub mod revocation;
pub mod routes;
pub mod settings;
pub mod token;
pub mod userinfo;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

// vim: ts=4
