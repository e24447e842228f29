//! Effective-value resolution over the three `SettingScope`s: client
//! overrides win over tenant overrides, which win over the global
//! default recorded on the `SettingDefinition`.

use std::collections::HashMap;
use std::sync::Mutex;

use idplat_types::prelude::*;
use idplat_types::types::TnId;
use idplat_types::lock;

use super::types::{FrozenSettingsRegistry, SettingValue};

#[derive(Clone, Eq, PartialEq, Hash)]
struct ScopedKey {
	tenant_id: Option<TnId>,
	client_id: Option<String>,
	key: String,
}

/// Runtime store of setting overrides, layered under a `FrozenSettingsRegistry`
/// of known definitions. A SQL-backed implementation would persist
/// `values` in a table keyed by `(tenant_id, client_id, key)`; this
/// process-memory version is sufficient for the default standalone binary
/// and for tests, per §9's "at least an in-memory implementation".
pub struct SettingsService {
	registry: FrozenSettingsRegistry,
	values: Mutex<HashMap<ScopedKey, SettingValue>>,
}

impl SettingsService {
	pub fn new(registry: FrozenSettingsRegistry) -> Self {
		Self { registry, values: Mutex::new(HashMap::new()) }
	}

	pub fn registry(&self) -> &FrozenSettingsRegistry {
		&self.registry
	}

	/// Resolve the effective value of `key` for an optional tenant and
	/// client, falling back through client -> tenant -> global default.
	pub fn get(&self, tenant_id: Option<TnId>, client_id: Option<&str>, key: &str) -> ClResult<Option<SettingValue>> {
		let values = lock!(self.values, "settings")?;

		if let (Some(client_id), Some(tenant_id)) = (client_id, tenant_id) {
			let scoped = ScopedKey {
				tenant_id: Some(tenant_id),
				client_id: Some(client_id.to_string()),
				key: key.to_string(),
			};
			if let Some(v) = values.get(&scoped) {
				return Ok(Some(v.clone()));
			}
		}
		if let Some(tenant_id) = tenant_id {
			let scoped = ScopedKey { tenant_id: Some(tenant_id), client_id: None, key: key.to_string() };
			if let Some(v) = values.get(&scoped) {
				return Ok(Some(v.clone()));
			}
		}
		let scoped = ScopedKey { tenant_id: None, client_id: None, key: key.to_string() };
		if let Some(v) = values.get(&scoped) {
			return Ok(Some(v.clone()));
		}
		Ok(self.registry.default_value(key))
	}

	pub fn get_i64(&self, tenant_id: Option<TnId>, client_id: Option<&str>, key: &str, fallback: i64) -> i64 {
		self.get(tenant_id, client_id, key)
			.ok()
			.flatten()
			.and_then(|v| v.as_i64())
			.unwrap_or(fallback)
	}

	pub fn set(&self, tenant_id: Option<TnId>, client_id: Option<&str>, key: &str, value: SettingValue) -> ClResult<()> {
		if self.registry.find_definition(key).is_none() {
			return Err(Error::ConfigError(format!("unknown setting key: {key}")));
		}
		let scoped = ScopedKey {
			tenant_id,
			client_id: client_id.map(str::to_string),
			key: key.to_string(),
		};
		let mut values = lock!(self.values, "settings")?;
		values.insert(scoped, value);
		Ok(())
	}
}

// vim: ts=4
