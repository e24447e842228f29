//! Settings subsystem types: tenant/client-overridable configuration for
//! every timeout and lifetime named in §5 ("All are overridable per
//! tenant and per client"), following the teacher's
//! `SettingDefinition::builder(...)`/`SettingsRegistry` pattern
//! (`cloudillo-core/src/settings`, `cloudillo-auth/src/settings.rs`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use idplat_types::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingScope {
	/// Platform-wide, not overridable per tenant.
	Global,
	/// Overridable per tenant.
	Tenant,
	/// Overridable per OAuth client within a tenant.
	Client,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
	User,
	Admin,
	Platform,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
	Bool(bool),
	Int(i64),
	Str(String),
}

impl SettingValue {
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			SettingValue::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			SettingValue::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			SettingValue::Str(v) => Some(v.as_str()),
			_ => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct SettingDefinition {
	pub key: String,
	pub description: String,
	pub default: Option<SettingValue>,
	pub scope: SettingScope,
	pub permission: PermissionLevel,
	pub optional: bool,
}

impl SettingDefinition {
	pub fn builder(key: impl Into<String>) -> SettingDefinitionBuilder {
		SettingDefinitionBuilder {
			key: key.into(),
			description: String::new(),
			default: None,
			scope: SettingScope::Global,
			permission: PermissionLevel::Admin,
			optional: false,
		}
	}

	/// True when `key` (a concrete setting name) matches this definition,
	/// including `prefix.*` wildcard definitions like `ui.*`/`app.*`.
	pub fn matches(&self, key: &str) -> bool {
		if let Some(prefix) = self.key.strip_suffix('*') {
			key.starts_with(prefix)
		} else {
			self.key == key
		}
	}
}

pub struct SettingDefinitionBuilder {
	key: String,
	description: String,
	default: Option<SettingValue>,
	scope: SettingScope,
	permission: PermissionLevel,
	optional: bool,
}

impl SettingDefinitionBuilder {
	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn default(mut self, default: SettingValue) -> Self {
		self.default = Some(default);
		self
	}

	pub fn scope(mut self, scope: SettingScope) -> Self {
		self.scope = scope;
		self
	}

	pub fn permission(mut self, permission: PermissionLevel) -> Self {
		self.permission = permission;
		self
	}

	pub fn optional(mut self, optional: bool) -> Self {
		self.optional = optional;
		self
	}

	pub fn build(self) -> ClResult<SettingDefinition> {
		if self.key.is_empty() {
			return Err(Error::ConfigError("setting key must not be empty".into()));
		}
		Ok(SettingDefinition {
			key: self.key,
			description: self.description,
			default: self.default,
			scope: self.scope,
			permission: self.permission,
			optional: self.optional,
		})
	}
}

#[derive(Clone, Debug)]
pub struct Setting {
	pub key: String,
	pub value: SettingValue,
}

/// Process-wide registry of known setting definitions, initialized at
/// startup by each crate's `init`/`register_settings` (§9 "Global state
/// ... Initialize at startup ... never mutate after construction").
#[derive(Default)]
pub struct SettingsRegistry {
	definitions: HashMap<String, SettingDefinition>,
}

impl SettingsRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, definition: SettingDefinition) -> ClResult<()> {
		self.definitions.insert(definition.key.clone(), definition);
		Ok(())
	}

	pub fn find_definition(&self, key: &str) -> Option<&SettingDefinition> {
		self.definitions.get(key).or_else(|| self.definitions.values().find(|d| d.matches(key)))
	}

	pub fn freeze(self) -> FrozenSettingsRegistry {
		FrozenSettingsRegistry { definitions: self.definitions }
	}
}

/// Read-only view handed out after startup registration completes.
#[derive(Clone)]
pub struct FrozenSettingsRegistry {
	definitions: HashMap<String, SettingDefinition>,
}

impl FrozenSettingsRegistry {
	pub fn find_definition(&self, key: &str) -> Option<&SettingDefinition> {
		self.definitions.get(key).or_else(|| self.definitions.values().find(|d| d.matches(key)))
	}

	pub fn default_value(&self, key: &str) -> Option<SettingValue> {
		self.find_definition(key).and_then(|d| d.default.clone())
	}
}

// vim: ts=4
