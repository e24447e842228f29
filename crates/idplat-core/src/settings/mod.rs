//! Settings subsystem: definitions, registry, and effective-value
//! resolution.

pub mod service;
pub mod types;

pub use service::SettingsService;
pub use types::{
	FrozenSettingsRegistry, PermissionLevel, Setting, SettingDefinition, SettingDefinitionBuilder,
	SettingScope, SettingValue, SettingsRegistry,
};

// vim: ts=4
