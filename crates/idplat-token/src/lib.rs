//! Token Service (§4.3): assembles claims, mints JWTs, persists grants,
//! computes `at_hash`/`c_hash`, and enforces configured lifetimes.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod jwt;
pub mod service;
pub mod settings;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

// vim: ts=4
