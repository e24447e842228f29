//! Shared primitive types and the §3 data model records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seconds-since-epoch timestamp, serialized as an integer on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Self {
		Timestamp(Utc::now().timestamp())
	}

	pub fn plus_seconds(self, secs: i64) -> Self {
		Timestamp(self.0 + secs)
	}

	pub fn is_past(self, now: Timestamp) -> bool {
		now.0 > self.0
	}

	pub fn to_chrono(self) -> DateTime<Utc> {
		DateTime::from_timestamp(self.0, 0).unwrap_or_else(Utc::now)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Tenant identifier. `None`/`Tenant::Global` means platform-global, per
/// §3's "every persisted entity except platform-level keys carries an
/// optional `tenant_id`; `null` means platform-global".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TnId(pub i64);

impl TnId {
	pub const PLATFORM: TnId = TnId(0);

	pub fn is_platform(self) -> bool {
		self == Self::PLATFORM
	}
}

impl fmt::Display for TnId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A field update that distinguishes "not supplied" from "set to null",
/// used by partial-update request bodies across the admin surface.
#[derive(Clone, Debug, Default)]
pub enum Patch<T> {
	#[default]
	Unset,
	Clear,
	Set(T),
}

impl<T> Patch<T> {
	pub fn into_option(self) -> Option<Option<T>> {
		match self {
			Patch::Unset => None,
			Patch::Clear => Some(None),
			Patch::Set(v) => Some(Some(v)),
		}
	}
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Option::<T>::deserialize(deserializer).map(|v| match v {
			Some(v) => Patch::Set(v),
			None => Patch::Clear,
		})
	}
}

/// Free-form, string-keyed, semi-structured value map used for
/// `journey_data`, `user_input`, and step configuration (§3 `JourneyState`).
pub type DataMap = BTreeMap<String, Value>;

// ---------------------------------------------------------------------
// Client (§3)
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	AuthorizationCode,
	RefreshToken,
	ClientCredentials,
	Ciba,
	DeviceCode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
	pub client_id: String,
	pub tenant_id: Option<TnId>,
	pub client_secrets: Vec<String>,
	pub allowed_grant_types: BTreeSet<GrantType>,
	pub redirect_uris: Vec<String>,
	pub post_logout_redirect_uris: Vec<String>,
	pub cors_origins: Vec<String>,
	pub allowed_scopes: BTreeSet<String>,
	pub access_token_lifetime_secs: Option<i64>,
	pub id_token_lifetime_secs: Option<i64>,
	pub refresh_token_lifetime_secs: Option<i64>,
	pub require_consent: bool,
	pub allow_remember_consent: bool,
	pub consent_lifetime_secs: Option<i64>,
	pub ciba_enabled: bool,
	pub is_native_client: bool,
}

// ---------------------------------------------------------------------
// Resource (§3)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
	IdentityResource(ResourceDef),
	ApiScope(ResourceDef),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDef {
	pub name: String,
	pub display_name: String,
	pub description: String,
	pub required: bool,
	pub emphasize: bool,
	pub user_claims: Vec<String>,
}

// ---------------------------------------------------------------------
// Signing keys & certificates (§3, §4.4)
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyUse {
	Signing,
	Encryption,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
	Rsa,
	Ec,
	Symmetric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyProvider {
	Local,
	Vault,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningKey {
	pub key_id: String,
	pub tenant_id: Option<TnId>,
	pub use_: KeyUse,
	pub key_type: KeyType,
	pub algorithm: String,
	pub public_key_data: String,
	pub encrypted_private_key_data: Option<String>,
	pub key_vault_uri: Option<String>,
	pub provider: KeyProvider,
	pub not_before: Timestamp,
	pub not_after: Timestamp,
	pub active: bool,
	pub x5t_sha1: Option<String>,
	pub x5t_sha256: Option<String>,
	pub certificate: Option<CertificateMaterial>,
}

bitflags::bitflags! {
	/// §9 "CertificateKeyUsage is a flag-set whose exact mapping to X.509
	/// key-usage bits is preserved in §4.4". Bit positions follow the
	/// X.509 KeyUsage extension (RFC 5280 §4.2.1.3) ordering.
	#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
	#[serde(transparent)]
	pub struct CertificateKeyUsage: u16 {
		const DIGITAL_SIGNATURE = 0b0000_0001;
		const NON_REPUDIATION   = 0b0000_0010;
		const KEY_ENCIPHERMENT  = 0b0000_0100;
		const DATA_ENCIPHERMENT = 0b0000_1000;
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CertificateMaterial {
	pub subject_dn: String,
	pub issuer_dn: String,
	pub serial: String,
	pub sha1_thumbprint: String,
	pub sha256_thumbprint: String,
	pub sans: Vec<String>,
	pub key_usage: CertificateKeyUsage,
	pub der: Vec<u8>,
}

// ---------------------------------------------------------------------
// Grants, consent, sessions (§3)
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
	AuthorizationCode,
	RefreshToken,
	ReferenceToken,
	DeviceCode,
	UserCode,
	Consent,
	CibaRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedGrant {
	pub grant_key: String,
	pub kind: GrantKind,
	pub subject_id: Option<String>,
	pub client_id: String,
	pub tenant_id: Option<TnId>,
	pub session_id: Option<String>,
	pub scopes: BTreeSet<String>,
	pub created_at: Timestamp,
	pub expires_at: Timestamp,
	pub serialized_payload: String,
	pub consumed_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Consent {
	pub subject_id: String,
	pub client_id: String,
	pub tenant_id: Option<TnId>,
	pub granted_scopes: BTreeSet<String>,
	pub created_at: Timestamp,
	pub expires_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
	pub session_id: String,
	pub subject_id: String,
	pub tenant_id: Option<TnId>,
	pub auth_time: Timestamp,
	pub amr: Vec<String>,
	pub acr: Option<String>,
	pub idle_deadline: Timestamp,
	pub absolute_deadline: Timestamp,
	pub sso_mode: bool,
}

// ---------------------------------------------------------------------
// Local user record (§4.2 LocalLogin references "the user service";
// not individually modeled in §3, supplemented here as the minimal
// record LocalLogin/Ldap/WebAuthn need to resolve a subject)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
	pub subject_id: String,
	pub tenant_id: Option<TnId>,
	pub username: String,
	pub password_hash: Option<String>,
	pub mfa_enabled: bool,
	pub totp_secret: Option<String>,
	pub groups: Vec<String>,
}

// ---------------------------------------------------------------------
// Journey policy and step definitions (§3)
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyType {
	SignIn,
	SignUp,
	PasswordReset,
	ProfileEdit,
	Waitlist,
	ContactForm,
	Survey,
	Feedback,
	Custom,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchCondition {
	pub attribute: String,
	pub operator: crate::condition::Operator,
	pub value: Value,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputClaimMapping {
	pub claim: String,
	pub source_path: String,
	pub default_value: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JourneyPolicy {
	pub id: String,
	pub tenant_id: Option<TnId>,
	pub journey_type: JourneyType,
	pub enabled: bool,
	pub priority: i32,
	pub steps: Vec<PolicyStep>,
	pub match_conditions: Vec<MatchCondition>,
	pub output_claims: Vec<OutputClaimMapping>,
	pub default_step_timeout_secs: i64,
	pub max_journey_duration_secs: i64,
	pub requires_authentication: bool,
	pub persist_submissions: bool,
	pub duplicate_check_fields: Vec<String>,
}

impl JourneyPolicy {
	/// `(tenant_id, client_id, type, scopes, acr_values, additional_parameters)`
	/// matching used by `find_matching` (§3).
	pub fn matches(&self, ctx: &crate::condition::MatchContext) -> bool {
		if !self.enabled {
			return false;
		}
		if self.journey_type != ctx.journey_type {
			return false;
		}
		self.match_conditions
			.iter()
			.all(|c| crate::condition::evaluate(&c.attribute, c.operator, &c.value, ctx))
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyStep {
	pub id: String,
	pub step_type: String,
	pub order: i32,
	pub display_name: Option<String>,
	pub config: DataMap,
	pub conditions: Vec<MatchCondition>,
	pub on_success: Option<String>,
	pub on_failure: Option<String>,
	pub branches: BTreeMap<String, String>,
	pub timeout_secs: Option<i64>,
	pub max_retries: u32,
	pub skip_if_completed: bool,
	pub required_claims: Vec<String>,
	pub output_claims: Vec<String>,
}

// ---------------------------------------------------------------------
// Journey state machine (§3, §4.1)
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
	InProgress,
	AwaitingInput,
	Completed,
	Failed,
	Expired,
	Cancelled,
}

impl JourneyStatus {
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			JourneyStatus::Completed
				| JourneyStatus::Failed
				| JourneyStatus::Expired
				| JourneyStatus::Cancelled
		)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JourneyState {
	pub id: String,
	pub policy_id: String,
	pub tenant_id: Option<TnId>,
	pub client_id: String,
	pub correlation_id: String,
	pub current_step_id: Option<String>,
	pub status: JourneyStatus,
	pub user_id: Option<String>,
	pub journey_data: DataMap,
	pub user_input: DataMap,
	pub completed_steps: BTreeSet<String>,
	pub retry_counts: BTreeMap<String, u32>,
	pub started_at: Timestamp,
	pub expires_at: Timestamp,
	pub last_activity_at: Timestamp,
	pub error: Option<JourneyError>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JourneyError {
	pub code: String,
	pub description: String,
}

// ---------------------------------------------------------------------
// Protocol state (§3)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolState {
	pub correlation_id: String,
	pub protocol_name: String,
	pub serialized_request: String,
	pub client_id: String,
	pub endpoint_type: String,
	pub properties: DataMap,
	pub expires_at: Timestamp,
}

// vim: ts=4
