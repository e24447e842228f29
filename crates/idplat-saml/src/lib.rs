//! SAML 2.0 protocol service (§4.6): an IdP role that parses inbound
//! `AuthnRequest`s, dispatches a sign-in journey, and returns a signed
//! `Response`/`Assertion`; an SP role that validates an inbound
//! `Response` against a trusted external IdP's certificate.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod binding;
pub mod claims;
pub mod idp;
pub mod metadata;
pub mod routes;
pub mod settings;
pub mod sign;
pub mod sp;
pub mod xml;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

// vim: ts=4
