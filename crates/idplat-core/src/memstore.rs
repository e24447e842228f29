//! In-memory implementations of every store contract in
//! `idplat_types::store` (§9 "Provide at least: an in-memory
//! implementation for tests"). Also suited to the default standalone
//! binary for evaluation/demo deployments; nothing here persists across
//! a process restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use idplat_types::condition::MatchContext;
use idplat_types::prelude::*;
use idplat_types::store::{
	ClientStore, ConsentStore, GrantStore, JourneyLockGuard, JourneyStateStore, PolicyStore,
	ProtocolStateStore, ResourceStore, SessionStore, SigningCredentialStore, UserStore,
};
use idplat_types::types::{
	Client, Consent, GrantKind, JourneyPolicy, JourneyState, PersistedGrant, ProtocolState, Resource,
	Session, SigningKey, User,
};

fn lock<T>(m: &Mutex<T>) -> ClResult<std::sync::MutexGuard<'_, T>> {
	m.lock().map_err(|_| Error::Internal("memstore mutex poisoned".into()))
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct TenantKey(Option<i64>, String);

fn tkey(tenant_id: Option<TnId>, key: &str) -> TenantKey {
	TenantKey(tenant_id.map(|t| t.0), key.to_string())
}

// ---------------------------------------------------------------------
// ClientStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryClientStore {
	clients: Mutex<HashMap<TenantKey, Client>>,
}

impl InMemoryClientStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
	async fn find_client(&self, tenant_id: Option<TnId>, client_id: &str) -> ClResult<Client> {
		lock(&self.clients)?.get(&tkey(tenant_id, client_id)).cloned().ok_or(Error::NotFound)
	}

	async fn put_client(&self, client: Client) -> ClResult<()> {
		let key = tkey(client.tenant_id, &client.client_id);
		lock(&self.clients)?.insert(key, client);
		Ok(())
	}

	async fn delete_client(&self, tenant_id: Option<TnId>, client_id: &str) -> ClResult<()> {
		lock(&self.clients)?.remove(&tkey(tenant_id, client_id));
		Ok(())
	}

	async fn find_client_by_origin(&self, origin: &str) -> ClResult<Vec<Client>> {
		Ok(lock(&self.clients)?.values().filter(|c| c.cors_origins.iter().any(|o| o == origin)).cloned().collect())
	}
}

// ---------------------------------------------------------------------
// ResourceStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryResourceStore {
	resources: Mutex<HashMap<TenantKey, Resource>>,
}

impl InMemoryResourceStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	fn name_of(resource: &Resource) -> &str {
		match resource {
			Resource::IdentityResource(def) | Resource::ApiScope(def) => &def.name,
		}
	}

	pub fn insert(&self, tenant_id: Option<TnId>, resource: Resource) -> ClResult<()> {
		let key = tkey(tenant_id, Self::name_of(&resource));
		lock(&self.resources)?.insert(key, resource);
		Ok(())
	}
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
	async fn list_resources(&self, tenant_id: Option<TnId>) -> ClResult<Vec<Resource>> {
		Ok(lock(&self.resources)?
			.iter()
			.filter(|(k, _)| k.0 == tenant_id.map(|t| t.0))
			.map(|(_, v)| v.clone())
			.collect())
	}

	async fn find_resource(&self, tenant_id: Option<TnId>, name: &str) -> ClResult<Resource> {
		lock(&self.resources)?.get(&tkey(tenant_id, name)).cloned().ok_or(Error::NotFound)
	}
}

// ---------------------------------------------------------------------
// GrantStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryGrantStore {
	grants: Mutex<HashMap<String, PersistedGrant>>,
}

impl InMemoryGrantStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
	async fn put_grant(&self, grant: PersistedGrant) -> ClResult<()> {
		lock(&self.grants)?.insert(grant.grant_key.clone(), grant);
		Ok(())
	}

	async fn find_grant(&self, grant_key: &str) -> ClResult<PersistedGrant> {
		lock(&self.grants)?.get(grant_key).cloned().ok_or(Error::InvalidGrant("unknown grant".into()))
	}

	async fn consume_grant(&self, grant_key: &str) -> ClResult<PersistedGrant> {
		let mut grants = lock(&self.grants)?;
		let grant = grants.get_mut(grant_key).ok_or_else(|| Error::InvalidGrant("unknown grant".into()))?;
		if grant.consumed_at.is_some() {
			return Err(Error::InvalidGrant("grant already redeemed".into()));
		}
		if grant.expires_at.is_past(Timestamp::now()) {
			return Err(Error::InvalidGrant("grant expired".into()));
		}
		grant.consumed_at = Some(Timestamp::now());
		Ok(grant.clone())
	}

	async fn revoke_grant(&self, grant_key: &str) -> ClResult<()> {
		if let Some(grant) = lock(&self.grants)?.get_mut(grant_key) {
			grant.consumed_at = Some(Timestamp::now());
		}
		Ok(())
	}

	async fn revoke_family(&self, family_root_key: &str) -> ClResult<()> {
		let mut grants = lock(&self.grants)?;
		for grant in grants.values_mut() {
			if grant.kind == GrantKind::RefreshToken && grant.serialized_payload.contains(family_root_key) {
				grant.consumed_at = Some(Timestamp::now());
			}
		}
		if let Some(root) = grants.get_mut(family_root_key) {
			root.consumed_at = Some(Timestamp::now());
		}
		Ok(())
	}

	async fn delete_expired(&self, now: Timestamp) -> ClResult<u64> {
		let mut grants = lock(&self.grants)?;
		let before = grants.len();
		grants.retain(|_, g| !g.expires_at.is_past(now));
		Ok((before - grants.len()) as u64)
	}
}

// ---------------------------------------------------------------------
// ConsentStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryConsentStore {
	consents: Mutex<HashMap<(Option<i64>, String, String), Consent>>,
}

impl InMemoryConsentStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
	async fn find_consent(&self, tenant_id: Option<TnId>, subject_id: &str, client_id: &str) -> ClResult<Option<Consent>> {
		let key = (tenant_id.map(|t| t.0), subject_id.to_string(), client_id.to_string());
		Ok(lock(&self.consents)?.get(&key).cloned())
	}

	async fn put_consent(&self, consent: Consent) -> ClResult<()> {
		let key = (consent.tenant_id.map(|t| t.0), consent.subject_id.clone(), consent.client_id.clone());
		lock(&self.consents)?.insert(key, consent);
		Ok(())
	}
}

// ---------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySessionStore {
	sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
	async fn find_session(&self, session_id: &str) -> ClResult<Session> {
		lock(&self.sessions)?.get(session_id).cloned().ok_or(Error::NotFound)
	}

	async fn put_session(&self, session: Session) -> ClResult<()> {
		lock(&self.sessions)?.insert(session.session_id.clone(), session);
		Ok(())
	}

	async fn delete_session(&self, session_id: &str) -> ClResult<()> {
		lock(&self.sessions)?.remove(session_id);
		Ok(())
	}
}

// ---------------------------------------------------------------------
// SigningCredentialStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySigningCredentialStore {
	keys: Mutex<HashMap<String, SigningKey>>,
}

impl InMemorySigningCredentialStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl SigningCredentialStore for InMemorySigningCredentialStore {
	async fn active_key(&self, tenant_id: Option<TnId>, algorithm: &str) -> ClResult<SigningKey> {
		lock(&self.keys)?
			.values()
			.filter(|k| k.active && k.algorithm == algorithm && k.tenant_id == tenant_id)
			.max_by_key(|k| k.not_before.0)
			.cloned()
			.ok_or(Error::NoSigningCredentials)
	}

	async fn find_key(&self, key_id: &str) -> ClResult<SigningKey> {
		lock(&self.keys)?.get(key_id).cloned().ok_or(Error::NotFound)
	}

	async fn publishable_keys(&self, tenant_id: Option<TnId>) -> ClResult<Vec<SigningKey>> {
		let now = Timestamp::now();
		Ok(lock(&self.keys)?
			.values()
			.filter(|k| k.tenant_id == tenant_id && (k.active || !k.not_after.is_past(now)))
			.cloned()
			.collect())
	}

	async fn put_key(&self, key: SigningKey) -> ClResult<()> {
		lock(&self.keys)?.insert(key.key_id.clone(), key);
		Ok(())
	}

	async fn rotate(&self, _tenant_id: Option<TnId>, new_key: SigningKey, retire_key_id: &str) -> ClResult<()> {
		let mut keys = lock(&self.keys)?;
		if let Some(old) = keys.get_mut(retire_key_id) {
			old.active = false;
		}
		keys.insert(new_key.key_id.clone(), new_key);
		Ok(())
	}
}

// ---------------------------------------------------------------------
// ProtocolStateStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProtocolStateStore {
	states: Mutex<HashMap<String, ProtocolState>>,
}

impl InMemoryProtocolStateStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl ProtocolStateStore for InMemoryProtocolStateStore {
	async fn put_state(&self, state: ProtocolState) -> ClResult<()> {
		lock(&self.states)?.insert(state.correlation_id.clone(), state);
		Ok(())
	}

	async fn find_state(&self, correlation_id: &str) -> ClResult<ProtocolState> {
		lock(&self.states)?.get(correlation_id).cloned().ok_or(Error::NotFound)
	}

	async fn consume_state(&self, correlation_id: &str) -> ClResult<ProtocolState> {
		lock(&self.states)?.remove(correlation_id).ok_or(Error::NotFound)
	}

	async fn delete_expired(&self, now: Timestamp) -> ClResult<u64> {
		let mut states = lock(&self.states)?;
		let before = states.len();
		states.retain(|_, s| !s.expires_at.is_past(now));
		Ok((before - states.len()) as u64)
	}
}

// ---------------------------------------------------------------------
// JourneyStateStore
// ---------------------------------------------------------------------

struct MutexJourneyLockGuard(#[allow(dead_code)] tokio::sync::OwnedMutexGuard<()>);
impl JourneyLockGuard for MutexJourneyLockGuard {}

#[derive(Default)]
pub struct InMemoryJourneyStateStore {
	states: Mutex<HashMap<String, JourneyState>>,
	locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InMemoryJourneyStateStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl JourneyStateStore for InMemoryJourneyStateStore {
	async fn put_state(&self, state: JourneyState) -> ClResult<()> {
		lock(&self.states)?.insert(state.id.clone(), state);
		Ok(())
	}

	async fn find_state(&self, journey_id: &str) -> ClResult<JourneyState> {
		lock(&self.states)?.get(journey_id).cloned().ok_or(Error::JourneyNotFound)
	}

	async fn delete_expired(&self, now: Timestamp) -> ClResult<u64> {
		let mut states = lock(&self.states)?;
		let before = states.len();
		states.retain(|_, s| !s.expires_at.is_past(now));
		Ok((before - states.len()) as u64)
	}

	async fn lock(&self, journey_id: &str) -> ClResult<Box<dyn JourneyLockGuard>> {
		let mutex = {
			let mut locks = lock(&self.locks)?;
			locks.entry(journey_id.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
		};
		let guard = mutex.lock_owned().await;
		Ok(Box::new(MutexJourneyLockGuard(guard)))
	}
}

// ---------------------------------------------------------------------
// PolicyStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryPolicyStore {
	policies: Mutex<HashMap<String, JourneyPolicy>>,
}

impl InMemoryPolicyStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn insert(&self, policy: JourneyPolicy) -> ClResult<()> {
		lock(&self.policies)?.insert(policy.id.clone(), policy);
		Ok(())
	}
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
	async fn find_matching(&self, ctx: &MatchContext) -> ClResult<Option<JourneyPolicy>> {
		Ok(lock(&self.policies)?
			.values()
			.filter(|p| p.matches(ctx))
			.max_by_key(|p| p.priority)
			.cloned())
	}

	async fn find_policy(&self, policy_id: &str) -> ClResult<JourneyPolicy> {
		lock(&self.policies)?.get(policy_id).cloned().ok_or_else(|| Error::InvalidPolicy(format!("no such policy: {policy_id}")))
	}

	async fn put_policy(&self, policy: JourneyPolicy) -> ClResult<()> {
		lock(&self.policies)?.insert(policy.id.clone(), policy);
		Ok(())
	}
}

// ---------------------------------------------------------------------
// UserStore
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryUserStore {
	by_username: Mutex<HashMap<TenantKey, User>>,
	by_id: Mutex<HashMap<TenantKey, User>>,
}

impl InMemoryUserStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl UserStore for InMemoryUserStore {
	async fn find_user(&self, tenant_id: Option<TnId>, username: &str) -> ClResult<User> {
		lock(&self.by_username)?.get(&tkey(tenant_id, username)).cloned().ok_or(Error::NotFound)
	}

	async fn find_user_by_id(&self, tenant_id: Option<TnId>, subject_id: &str) -> ClResult<User> {
		lock(&self.by_id)?.get(&tkey(tenant_id, subject_id)).cloned().ok_or(Error::NotFound)
	}

	async fn provision_user(&self, user: User) -> ClResult<()> {
		lock(&self.by_username)?.insert(tkey(user.tenant_id, &user.username), user.clone());
		lock(&self.by_id)?.insert(tkey(user.tenant_id, &user.subject_id), user);
		Ok(())
	}
}

// vim: ts=4
