//! Builds one `App` for the standalone binary: every in-memory store,
//! every crate's settings and step handlers, a demo signing key and
//! TLS certificate, and a seeded demo tenant (client/user/policy) so
//! the server answers something useful with no external database.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use argon2::password_hash::{rand_core::OsRng as ArgonOsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};

use idplat_core::app::{AppBuilderOpts, AppState};
use idplat_core::cors::CorsOriginCache;
use idplat_core::extensions::Extensions;
use idplat_core::memstore::{
	InMemoryClientStore, InMemoryConsentStore, InMemoryGrantStore, InMemoryJourneyStateStore,
	InMemoryPolicyStore, InMemoryProtocolStateStore, InMemoryResourceStore, InMemorySessionStore,
	InMemorySigningCredentialStore, InMemoryUserStore,
};
use idplat_core::scheduler::{InMemoryTaskStore, Scheduler, TaskStore};
use idplat_core::settings::service::SettingsService;
use idplat_core::settings::SettingsRegistry;
use idplat_core::step_handler::StepHandlerRegistry;
use idplat_keys::cert::{self, CertRequest, GeneratedCertificate};
use idplat_keys::encryption::{EncryptionService, LocalEncryptionService};
use idplat_keys::keygen::{self, RsaBits};
use idplat_keys::provider::ProviderRegistry;
use idplat_types::store::{ClientStore, PolicyStore, SigningCredentialStore, UserStore};
use idplat_types::types::{
	CertificateKeyUsage, CertificateMaterial, DataMap, GrantType, JourneyPolicy, JourneyType,
	KeyProvider, KeyType, KeyUse, PolicyStep, SigningKey, User,
};
use idplat_types::utils::random_handle;

use crate::prelude::*;

/// Demo client id seeded for local testing; not meant to survive a real
/// deployment.
pub const DEMO_CLIENT_ID: &str = "demo-client";
pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-password";
const DEMO_POLICY_ID: &str = "demo-sign-in";

/// A fully wired `App` plus the PEM material the HTTPS listener binds.
pub struct Bootstrapped {
	pub app: App,
	pub tls_cert_pem: String,
	pub tls_key_pem: String,
}

pub async fn bootstrap(opts: AppBuilderOpts) -> ClResult<Bootstrapped> {
	let mut registry = SettingsRegistry::new();
	idplat_core::register_settings(&mut registry)?;
	idplat_token::register_settings(&mut registry)?;
	idplat_tenant::register_settings(&mut registry)?;
	idplat_keys::register_settings(&mut registry)?;
	idplat_journey::register_settings(&mut registry)?;
	idplat_oidc::register_settings(&mut registry)?;
	idplat_saml::register_settings(&mut registry)?;
	let frozen = registry.freeze();
	let settings = Arc::new(SettingsService::new(frozen.clone()));

	let mut step_handlers = StepHandlerRegistry::new();
	idplat_journey::steps::register_all(&mut step_handlers);

	let client_store: Arc<dyn ClientStore> = InMemoryClientStore::new();
	let resource_store = InMemoryResourceStore::new();
	let grant_store = InMemoryGrantStore::new();
	let consent_store = InMemoryConsentStore::new();
	let session_store = InMemorySessionStore::new();
	let signing_store: Arc<dyn SigningCredentialStore> = InMemorySigningCredentialStore::new();
	let protocol_state_store = InMemoryProtocolStateStore::new();
	let journey_state_store = InMemoryJourneyStateStore::new();
	let policy_store: Arc<dyn PolicyStore> = InMemoryPolicyStore::new();
	let user_store: Arc<dyn UserStore> = InMemoryUserStore::new();

	let task_store: Arc<dyn TaskStore<App>> = InMemoryTaskStore::new();
	let scheduler = Scheduler::<App>::new(task_store);

	let mut extensions = Extensions::new();
	extensions.insert::<Arc<ProviderRegistry>>(Arc::new(ProviderRegistry::new()));

	let mut master_key = [0u8; 32];
	OsRng.fill_bytes(&mut master_key);
	let encryption: Arc<dyn EncryptionService> = Arc::new(LocalEncryptionService::new(&master_key));
	extensions.insert::<Arc<dyn EncryptionService>>(encryption.clone());

	let tls_cert = generate_tls_certificate()?;

	let app_state = AppState {
		scheduler: scheduler.clone(),
		opts,
		client_store,
		resource_store,
		grant_store,
		consent_store,
		session_store,
		signing_store: signing_store.clone(),
		protocol_state_store,
		journey_state_store,
		policy_store: policy_store.clone(),
		user_store: user_store.clone(),
		step_handlers: Arc::new(step_handlers),
		claims_providers: RwLock::new(Vec::new()),
		cors_cache: CorsOriginCache::new(300),
		settings,
		settings_registry: Arc::new(frozen),
		extensions,
	};
	let app: App = Arc::new(app_state);

	scheduler.start(app.clone());
	idplat_journey::init(&app)?;
	idplat_keys::init(&app)?;

	seed_signing_key(&app, encryption.as_ref()).await?;
	seed_demo_tenant(&app).await?;

	Ok(Bootstrapped { app, tls_cert_pem: tls_cert.pem, tls_key_pem: tls_cert.key_pair_pem })
}

fn generate_tls_certificate() -> ClResult<GeneratedCertificate> {
	cert::generate_self_signed(&CertRequest {
		common_name: "localhost",
		sans: &["localhost".to_string()],
		key_usage: CertificateKeyUsage::DIGITAL_SIGNATURE | CertificateKeyUsage::KEY_ENCIPHERMENT,
		validity_days: 365,
	})
}

/// Generates one RS256 signing key with a matching self-signed
/// certificate and registers it as the platform's active key, the way
/// `idplat_keys::rotation` does when it finds none.
async fn seed_signing_key(app: &App, encryption: &dyn EncryptionService) -> ClResult<()> {
	let material = keygen::generate_rsa(RsaBits::Rsa2048)?;
	let private_der = base64_decode(&material.private_key_der_b64)?;
	let encrypted_private_key_data = Some(encryption.encrypt(&private_der)?);

	let generated = cert::generate_self_signed(&CertRequest {
		common_name: "idplat-server signing key",
		sans: &[],
		key_usage: CertificateKeyUsage::DIGITAL_SIGNATURE,
		validity_days: 90,
	})?;
	let certificate = CertificateMaterial {
		subject_dn: generated.subject_dn,
		issuer_dn: generated.issuer_dn,
		serial: generated.serial,
		sha1_thumbprint: generated.sha1_thumbprint,
		sha256_thumbprint: generated.sha256_thumbprint,
		sans: Vec::new(),
		key_usage: CertificateKeyUsage::DIGITAL_SIGNATURE,
		der: generated.der,
	};

	let not_before = Timestamp::now();
	let key = SigningKey {
		key_id: random_handle()?,
		tenant_id: None,
		use_: KeyUse::Signing,
		key_type: KeyType::Rsa,
		algorithm: "RS256".into(),
		public_key_data: material.public_key_der_b64,
		encrypted_private_key_data,
		key_vault_uri: None,
		provider: KeyProvider::Local,
		not_before,
		not_after: not_before.plus_seconds(90 * 86_400),
		active: true,
		x5t_sha1: Some(certificate.sha1_thumbprint.clone()),
		x5t_sha256: Some(certificate.sha256_thumbprint.clone()),
		certificate: Some(certificate),
	};
	app.signing_store.put_key(key).await
}

/// Seeds one confidential client, one local-password user, and one
/// `SignIn` policy with a single `local_login` step, so an
/// authorization-code flow against this server works out of the box.
async fn seed_demo_tenant(app: &App) -> ClResult<()> {
	let allowed_grant_types = BTreeSet::from([GrantType::AuthorizationCode, GrantType::RefreshToken]);
	let allowed_scopes = BTreeSet::from(["openid".to_string(), "profile".to_string(), "email".to_string()]);

	app.client_store
		.put_client(Client {
			client_id: DEMO_CLIENT_ID.into(),
			tenant_id: None,
			client_secrets: vec!["demo-secret".into()],
			allowed_grant_types,
			redirect_uris: vec!["http://localhost:8080/callback".into()],
			post_logout_redirect_uris: vec!["http://localhost:8080/".into()],
			cors_origins: vec!["http://localhost:8080".into()],
			allowed_scopes,
			access_token_lifetime_secs: None,
			id_token_lifetime_secs: None,
			refresh_token_lifetime_secs: None,
			require_consent: false,
			allow_remember_consent: true,
			consent_lifetime_secs: None,
			ciba_enabled: false,
			is_native_client: false,
		})
		.await?;

	let password_hash = hash_password(DEMO_PASSWORD)?;
	app.user_store
		.provision_user(User {
			subject_id: "demo-user".into(),
			tenant_id: None,
			username: DEMO_USERNAME.into(),
			password_hash: Some(password_hash),
			mfa_enabled: false,
			totp_secret: None,
			groups: vec!["users".into()],
		})
		.await?;

	app.policy_store
		.put_policy(JourneyPolicy {
			id: DEMO_POLICY_ID.into(),
			tenant_id: None,
			journey_type: JourneyType::SignIn,
			enabled: true,
			priority: 0,
			steps: vec![PolicyStep {
				id: "local_login".into(),
				step_type: "local_login".into(),
				order: 0,
				display_name: Some("Sign in".into()),
				config: DataMap::new(),
				conditions: Vec::new(),
				on_success: None,
				on_failure: None,
				branches: Default::default(),
				timeout_secs: None,
				max_retries: 0,
				skip_if_completed: false,
				required_claims: Vec::new(),
				output_claims: vec!["auth_time".into(), "user".into()],
			}],
			match_conditions: Vec::new(),
			output_claims: Vec::new(),
			default_step_timeout_secs: 300,
			max_journey_duration_secs: 1800,
			requires_authentication: false,
			persist_submissions: false,
			duplicate_check_fields: Vec::new(),
		})
		.await
}

fn hash_password(password: &str) -> ClResult<String> {
	let salt = SaltString::generate(&mut ArgonOsRng);
	Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map(|h| h.to_string())
		.map_err(|e| Error::Internal(format!("demo password hashing failed: {e}")))
}

fn base64_decode(s: &str) -> ClResult<Vec<u8>> {
	use base64::{engine::general_purpose::STANDARD, Engine};
	STANDARD.decode(s).map_err(|e| Error::Internal(format!("generated key encoding error: {e}")))
}

// vim: ts=4
