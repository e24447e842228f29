//! Tenant & Issuer Resolution (§4.7): resolves the effective tenant for
//! a request and the issuer URI minted into tokens and the discovery
//! document.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod resolver;
pub mod settings;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

// vim: ts=4
