//! CORS-origin cache (§5 "A CORS-origin cache aggregates client origins
//! across all tenants with a 5-minute TTL and is explicitly invalidated
//! on client mutations"; §9 open question: `OidcCorsPolicyProvider`
//! intentionally queries clients across all tenants because CORS runs
//! before tenant resolution — preserved as specified).

use std::sync::RwLock;

use idplat_types::prelude::*;
use idplat_types::store::ClientStore;
use idplat_types::types::Timestamp;

struct CacheEntry {
	origins: Vec<String>,
	fetched_at: Timestamp,
}

pub struct CorsOriginCache {
	ttl_secs: i64,
	entry: RwLock<Option<CacheEntry>>,
}

impl CorsOriginCache {
	pub fn new(ttl_secs: i64) -> Self {
		Self { ttl_secs, entry: RwLock::new(None) }
	}

	/// Explicit invalidation hook (§9 "invalidate via explicit signals");
	/// call on any client create/update/delete.
	pub fn invalidate(&self) -> ClResult<()> {
		let mut entry = lock_write(&self.entry)?;
		*entry = None;
		Ok(())
	}

	pub async fn is_allowed_origin(&self, store: &dyn ClientStore, origin: &str) -> ClResult<bool> {
		let now = Timestamp::now();
		{
			let entry = lock_read(&self.entry)?;
			if let Some(entry) = entry.as_ref() {
				if now.0 - entry.fetched_at.0 < self.ttl_secs {
					return Ok(entry.origins.iter().any(|o| o == origin));
				}
			}
		}

		let clients = store.find_client_by_origin(origin).await?;
		let found = !clients.is_empty();

		let origins: Vec<String> = clients.into_iter().flat_map(|c| c.cors_origins).collect();
		let mut entry = lock_write(&self.entry)?;
		*entry = Some(CacheEntry { origins, fetched_at: now });
		Ok(found)
	}
}

fn lock_read<T>(lock: &RwLock<T>) -> ClResult<std::sync::RwLockReadGuard<'_, T>> {
	lock.read().map_err(|_| Error::Internal("cors cache lock poisoned".into()))
}

fn lock_write<T>(lock: &RwLock<T>) -> ClResult<std::sync::RwLockWriteGuard<'_, T>> {
	lock.write().map_err(|_| Error::Internal("cors cache lock poisoned".into()))
}

// vim: ts=4
