//! Signing Key & Certificate Management (§4.4): key-material generation,
//! encrypted-at-rest storage, self-signed X.509 issuance, JWKS
//! publication, and scheduled rotation ahead of expiry.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod cert;
pub mod encryption;
pub mod jwks;
pub mod keygen;
pub mod provider;
pub mod rotation;
pub mod settings;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

/// Registers this crate's background tasks.
pub fn init(app: &App) -> ClResult<()> {
	app.scheduler.register::<rotation::KeyRotationTask>()?;
	Ok(())
}

// vim: ts=4
