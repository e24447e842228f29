//! Application state: the `App = Arc<AppState>` handle threaded through
//! every Axum extractor and background task, following the teacher's
//! `cloudillo-core::app` shape (an `Arc<dyn Store>` field per pluggable
//! capability, plus a type-erased `Extensions` map for anything that
//! doesn't deserve its own field).

use std::path::Path;
use std::sync::{Arc, RwLock};

use idplat_types::extract::TnIdResolver;
use idplat_types::prelude::*;
use idplat_types::store::{
	ClientStore, ConsentStore, GrantStore, JourneyStateStore, PolicyStore, ProtocolStateStore,
	ResourceStore, SessionStore, SigningCredentialStore, UserStore,
};
use idplat_types::types::TnId;

use crate::claims::ClaimsProvider;
use crate::cors::CorsOriginCache;
use crate::extensions::Extensions;
use crate::scheduler::Scheduler;
use crate::settings::service::SettingsService;
use crate::settings::types::FrozenSettingsRegistry;
use crate::step_handler::StepHandlerRegistry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
	Standalone,
	Proxy,
}

pub struct AppState {
	pub scheduler: Arc<Scheduler<App>>,
	pub opts: AppBuilderOpts,

	pub client_store: Arc<dyn ClientStore>,
	pub resource_store: Arc<dyn ResourceStore>,
	pub grant_store: Arc<dyn GrantStore>,
	pub consent_store: Arc<dyn ConsentStore>,
	pub session_store: Arc<dyn SessionStore>,
	pub signing_store: Arc<dyn SigningCredentialStore>,
	pub protocol_state_store: Arc<dyn ProtocolStateStore>,
	pub journey_state_store: Arc<dyn JourneyStateStore>,
	pub policy_store: Arc<dyn PolicyStore>,
	pub user_store: Arc<dyn UserStore>,

	pub step_handlers: Arc<StepHandlerRegistry>,
	pub claims_providers: RwLock<Vec<Arc<dyn ClaimsProvider>>>,
	pub cors_cache: CorsOriginCache,

	pub settings: Arc<SettingsService>,
	pub settings_registry: Arc<FrozenSettingsRegistry>,

	pub extensions: Extensions,
}

impl AppState {
	/// Get a registered extension by type. Returns error if not found.
	pub fn ext<T: Send + Sync + 'static>(&self) -> ClResult<&T> {
		self.extensions
			.get::<T>()
			.ok_or_else(|| Error::Internal(format!("Extension {} not registered", std::any::type_name::<T>())))
	}

	pub fn register_claims_provider(&self, provider: Arc<dyn ClaimsProvider>) -> ClResult<()> {
		let mut providers = self
			.claims_providers
			.write()
			.map_err(|_| Error::Internal("claims provider list poisoned".into()))?;
		providers.push(provider);
		Ok(())
	}
}

pub type App = Arc<AppState>;

#[async_trait::async_trait]
impl TnIdResolver for AppState {
	/// Tenant & Issuer Resolution (§4.7): resolution by header/claim/client
	/// binding happens in request middleware which stamps an `IdTag` onto
	/// request extensions; this resolves that tag to a concrete `TnId`
	/// against the client store's tenant-bound clients, falling back to
	/// platform scope for an id_tag of `"platform"`.
	async fn resolve_tn_id(&self, id_tag: &str) -> Result<TnId, Error> {
		if id_tag == "platform" {
			return Ok(TnId::PLATFORM);
		}
		id_tag.parse::<i64>().map(TnId).map_err(|_| Error::PermissionDenied)
	}
}

pub struct Adapters {
	pub client_store: Option<Arc<dyn ClientStore>>,
	pub resource_store: Option<Arc<dyn ResourceStore>>,
	pub grant_store: Option<Arc<dyn GrantStore>>,
	pub consent_store: Option<Arc<dyn ConsentStore>>,
	pub session_store: Option<Arc<dyn SessionStore>>,
	pub signing_store: Option<Arc<dyn SigningCredentialStore>>,
	pub protocol_state_store: Option<Arc<dyn ProtocolStateStore>>,
	pub journey_state_store: Option<Arc<dyn JourneyStateStore>>,
	pub policy_store: Option<Arc<dyn PolicyStore>>,
	pub user_store: Option<Arc<dyn UserStore>>,
}

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub mode: ServerMode,
	pub listen: Box<str>,
	pub listen_http: Option<Box<str>>,
	/// Platform-configured issuer URI, used when no tenant-level override
	/// exists (§4.7 "Issuer URI is resolved in order: tenant token
	/// settings, tenant custom domain, platform-configured issuer,
	/// request scheme+host").
	pub platform_issuer: Option<Box<str>>,
	pub dist_dir: Box<Path>,
	pub tmp_dir: Box<Path>,
}

// vim: ts=4
