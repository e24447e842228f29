//! Journey orchestrator: the resumable, policy-driven state machine
//! that advances a principal through sign-in, sign-up, and other
//! authentication journeys (§4.1, §4.2).

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod cleanup;
pub mod orchestrator;
pub mod settings;
pub mod steps;

mod prelude;

use crate::prelude::*;

pub fn register_settings(registry: &mut idplat_core::settings::SettingsRegistry) -> ClResult<()> {
	settings::register_settings(registry)
}

/// Registers this crate's background tasks, following the teacher's
/// `cloudillo-auth::init(app: &App)` convention. Step handlers are
/// registered separately, before `AppState` is built — see
/// `steps::register_all`.
pub fn init(app: &App) -> ClResult<()> {
	app.scheduler.register::<cleanup::JourneyCleanupTask>()?;
	Ok(())
}

// vim: ts=4
