//! Pluggable store contracts (§9 "Express each store ... as a capability
//! interface"). Each trait mirrors the teacher's `Arc<dyn XAdapter>`
//! pattern (`cloudillo-core::app::AppState` holding `auth_adapter: Arc<dyn
//! AuthAdapter>` etc.) — concrete crates hold `Arc<dyn ClientStore>` and so
//! on rather than depending on a specific backend.

use async_trait::async_trait;

use crate::error::ClResult;
use crate::types::{
	Client, Consent, JourneyPolicy, JourneyState, PersistedGrant, ProtocolState, Resource, Session,
	SigningKey, TnId, User,
};

#[async_trait]
pub trait ClientStore: Send + Sync {
	async fn find_client(&self, tenant_id: Option<TnId>, client_id: &str) -> ClResult<Client>;
	async fn put_client(&self, client: Client) -> ClResult<()>;
	async fn delete_client(&self, tenant_id: Option<TnId>, client_id: &str) -> ClResult<()>;
	/// Used by CORS preflight, which runs before tenant resolution —
	/// queries across all tenants (§9 open question, preserved as-is).
	async fn find_client_by_origin(&self, origin: &str) -> ClResult<Vec<Client>>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
	async fn list_resources(&self, tenant_id: Option<TnId>) -> ClResult<Vec<Resource>>;
	async fn find_resource(&self, tenant_id: Option<TnId>, name: &str) -> ClResult<Resource>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
	async fn put_grant(&self, grant: PersistedGrant) -> ClResult<()>;
	async fn find_grant(&self, grant_key: &str) -> ClResult<PersistedGrant>;
	/// Atomic "mark-consumed-if-not-consumed returning the previous value"
	/// compare-and-set (§5 "Ordering guarantees"; §8 invariant 1).
	async fn consume_grant(&self, grant_key: &str) -> ClResult<PersistedGrant>;
	async fn revoke_grant(&self, grant_key: &str) -> ClResult<()>;
	/// Cascades revocation to dependent refresh tokens in the same family.
	async fn revoke_family(&self, family_root_key: &str) -> ClResult<()>;
	async fn delete_expired(&self, now: crate::types::Timestamp) -> ClResult<u64>;
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
	async fn find_consent(
		&self,
		tenant_id: Option<TnId>,
		subject_id: &str,
		client_id: &str,
	) -> ClResult<Option<Consent>>;
	async fn put_consent(&self, consent: Consent) -> ClResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
	async fn find_session(&self, session_id: &str) -> ClResult<Session>;
	async fn put_session(&self, session: Session) -> ClResult<()>;
	async fn delete_session(&self, session_id: &str) -> ClResult<()>;
}

#[async_trait]
pub trait SigningCredentialStore: Send + Sync {
	/// Active key for `(tenant_id, algorithm)`; fails with
	/// `Error::NoSigningCredentials` when none is available (§4.3 "Signing").
	async fn active_key(&self, tenant_id: Option<TnId>, algorithm: &str) -> ClResult<SigningKey>;
	async fn find_key(&self, key_id: &str) -> ClResult<SigningKey>;
	/// All keys still permitted in the JWKS (active, or retired within the
	/// grace window past `not_after`) for a tenant.
	async fn publishable_keys(&self, tenant_id: Option<TnId>) -> ClResult<Vec<SigningKey>>;
	async fn put_key(&self, key: SigningKey) -> ClResult<()>;
	/// Rotation: persist the new key and retire the old one in one unit.
	async fn rotate(&self, tenant_id: Option<TnId>, new_key: SigningKey, retire_key_id: &str) -> ClResult<()>;
}

#[async_trait]
pub trait ProtocolStateStore: Send + Sync {
	async fn put_state(&self, state: ProtocolState) -> ClResult<()>;
	async fn find_state(&self, correlation_id: &str) -> ClResult<ProtocolState>;
	/// Consumed exactly once when the journey finishes (§3 lifecycle note).
	async fn consume_state(&self, correlation_id: &str) -> ClResult<ProtocolState>;
	async fn delete_expired(&self, now: crate::types::Timestamp) -> ClResult<u64>;
}

#[async_trait]
pub trait JourneyStateStore: Send + Sync {
	async fn put_state(&self, state: JourneyState) -> ClResult<()>;
	async fn find_state(&self, journey_id: &str) -> ClResult<JourneyState>;
	async fn delete_expired(&self, now: crate::types::Timestamp) -> ClResult<u64>;
	/// Acquire the per-journey lock for the duration of one `continue` call
	/// (§5 "acquires a per-journey lock ... for the duration of a continue
	/// call"). Implementations may use a real distributed lock or a
	/// conditional write; the in-memory store uses a per-id async mutex.
	async fn lock(&self, journey_id: &str) -> ClResult<Box<dyn JourneyLockGuard>>;
}

/// RAII guard for the per-journey lock; dropping releases it.
pub trait JourneyLockGuard: Send {}

/// Not one of the nine capability stores named in §9's list, but needed
/// to ground the "validates against user service" line in §4.2's
/// LocalLogin contract; kept minimal (credential lookup + group
/// membership only, no profile management).
#[async_trait]
pub trait UserStore: Send + Sync {
	async fn find_user(&self, tenant_id: Option<TnId>, username: &str) -> ClResult<User>;
	async fn find_user_by_id(&self, tenant_id: Option<TnId>, subject_id: &str) -> ClResult<User>;
	async fn provision_user(&self, user: User) -> ClResult<()>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
	async fn find_matching(
		&self,
		ctx: &crate::condition::MatchContext,
	) -> ClResult<Option<JourneyPolicy>>;
	async fn find_policy(&self, policy_id: &str) -> ClResult<JourneyPolicy>;
	async fn put_policy(&self, policy: JourneyPolicy) -> ClResult<()>;
}

// vim: ts=4
