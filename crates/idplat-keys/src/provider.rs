//! Key-material provider registry. A `KeyMaterialProvider` generates and
//! (for `Vault`) may custody private key material outside the database;
//! `is_available` lets callers skip a provider that isn't configured in
//! the current deployment rather than fail key generation outright.

use std::collections::HashMap;

use crate::keygen::{self, EcCurve, GeneratedKeyMaterial, RsaBits, SymmetricBits};
use crate::prelude::*;

pub enum KeyRequest {
	Rsa(RsaBits),
	Ec(EcCurve),
	Symmetric(SymmetricBits),
}

pub trait KeyMaterialProvider: Send + Sync {
	fn provider(&self) -> KeyProvider;
	/// Whether this provider is configured and reachable in the current
	/// deployment. A registry entry that returns `false` is skipped by
	/// `ProviderRegistry::generate`.
	fn is_available(&self) -> bool;
	fn generate(&self, request: &KeyRequest) -> ClResult<GeneratedKeyMaterial>;
}

/// Generates key material directly in this process. Always available.
pub struct LocalKeyMaterialProvider;

impl KeyMaterialProvider for LocalKeyMaterialProvider {
	fn provider(&self) -> KeyProvider {
		KeyProvider::Local
	}

	fn is_available(&self) -> bool {
		true
	}

	fn generate(&self, request: &KeyRequest) -> ClResult<GeneratedKeyMaterial> {
		match request {
			KeyRequest::Rsa(bits) => keygen::generate_rsa(*bits),
			KeyRequest::Ec(curve) => keygen::generate_ec(*curve),
			KeyRequest::Symmetric(bits) => Ok(keygen::generate_symmetric(*bits)),
		}
	}
}

/// Generates key material through an external key vault. Unimplemented
/// until a vault client is wired in; `is_available` reports `false` so
/// the registry falls back to `Local` rather than failing generation.
pub struct VaultKeyMaterialProvider;

impl KeyMaterialProvider for VaultKeyMaterialProvider {
	fn provider(&self) -> KeyProvider {
		KeyProvider::Vault
	}

	fn is_available(&self) -> bool {
		false
	}

	fn generate(&self, _request: &KeyRequest) -> ClResult<GeneratedKeyMaterial> {
		Err(Error::ConfigError("key vault provider is not configured".into()))
	}
}

pub struct ProviderRegistry {
	providers: HashMap<KeyProvider, Box<dyn KeyMaterialProvider>>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		let mut providers: HashMap<KeyProvider, Box<dyn KeyMaterialProvider>> = HashMap::new();
		providers.insert(KeyProvider::Local, Box::new(LocalKeyMaterialProvider));
		providers.insert(KeyProvider::Vault, Box::new(VaultKeyMaterialProvider));
		Self { providers }
	}

	/// Providers currently configured and reachable.
	pub fn available(&self) -> Vec<KeyProvider> {
		self.providers.values().filter(|p| p.is_available()).map(|p| p.provider()).collect()
	}

	/// The provider used when a key doesn't request one explicitly:
	/// `Local` unless a `Vault` provider is configured and available.
	pub fn default_provider(&self) -> KeyProvider {
		if self.providers.get(&KeyProvider::Vault).is_some_and(|p| p.is_available()) {
			KeyProvider::Vault
		} else {
			KeyProvider::Local
		}
	}

	pub fn generate(&self, provider: KeyProvider, request: &KeyRequest) -> ClResult<GeneratedKeyMaterial> {
		let provider = self
			.providers
			.get(&provider)
			.ok_or_else(|| Error::ConfigError(format!("unknown key provider: {provider:?}")))?;
		if !provider.is_available() {
			return Err(Error::ConfigError(format!("key provider {:?} is not available", provider.provider())));
		}
		provider.generate(request)
	}
}

impl Default for ProviderRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn local_provider_is_always_available() {
		let registry = ProviderRegistry::new();
		assert!(registry.available().contains(&KeyProvider::Local));
		assert_eq!(registry.default_provider(), KeyProvider::Local);
	}

	#[test]
	fn unavailable_provider_fails_generation() {
		let registry = ProviderRegistry::new();
		let err = registry.generate(KeyProvider::Vault, &KeyRequest::Symmetric(SymmetricBits::Bits256));
		assert!(err.is_err());
	}

	#[test]
	fn local_provider_generates_requested_key_type() {
		let registry = ProviderRegistry::new();
		let material = registry.generate(KeyProvider::Local, &KeyRequest::Rsa(RsaBits::Rsa2048)).unwrap();
		assert!(!material.private_key_der_b64.is_empty());
	}
}

// vim: ts=4
