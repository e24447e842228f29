//! Core infrastructure: app state, the step handler registry, claims
//! providers, the settings subsystem, the CORS-origin cache, and the
//! background task scheduler.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod claims;
pub mod core_settings;
pub mod cors;
pub mod extensions;
pub mod memstore;
pub mod prelude;
pub mod scheduler;
pub mod settings;
pub mod step_handler;

pub use app::{App, AppBuilderOpts, AppState, ServerMode};

use idplat_types::error::ClResult;

/// Register every setting this crate owns. Feature crates follow the
/// same `register_settings(&mut SettingsRegistry) -> ClResult<()>`
/// convention and are called in turn during bootstrap, before the
/// registry is frozen.
pub fn register_settings(registry: &mut settings::SettingsRegistry) -> ClResult<()> {
	core_settings::register_settings(registry)
}

// vim: ts=4
