//! Error handling subsystem: a single `Error` enum carrying a stable wire
//! code, used across every crate in the workspace.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::prelude::*;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub error_description: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, error_description: impl Into<String>) -> Self {
		ErrorResponse { error: error.into(), error_description: error_description.into() }
	}
}

#[derive(Debug)]
pub enum Error {
	// Core errors
	NotFound,
	PermissionDenied,
	Unauthorized,
	DbError,
	Parse,

	// Input validation and constraints
	ValidationError(String),
	Conflict(String),
	PreconditionRequired(String),

	// Network and external services
	NetworkError(String),
	Timeout,

	// System and configuration
	ConfigError(String),
	ServiceUnavailable(String),
	Internal(String),
	CryptoError(String),

	Io(std::io::Error),

	// §7 protocol-level errors, translated directly onto the wire with
	// their OAuth/OIDC wire name as `error`.
	InvalidRequest(String),
	InvalidClient(String),
	InvalidGrant(String),
	UnauthorizedClient(String),
	UnsupportedGrantType(String),
	UnsupportedResponseType(String),
	InvalidScope(String),
	AccessDenied(String),
	LoginRequired,
	ConsentRequired,
	InteractionRequired,
	ServerError(String),
	TemporarilyUnavailable(String),

	// §4.5 CIBA/device-code polling errors (RFC 8628 §3.5, OIDC CIBA §13).
	AuthorizationPending,
	SlowDown,
	ExpiredToken(String),

	// §7 orchestrator-level errors. Translated to `server_error` at the
	// wire unless the redirect URI has already been validated.
	JourneyNotFound,
	JourneyExpired,
	NoPolicy,
	InvalidPolicy(String),
	StepTimeout(String),
	StepConfigError(String),

	// §7 fatal signing errors: logged with operator detail, never echoed.
	NoSigningCredentials,
	KeyDecryptFailed,

	// §7: surfaced to the HTTP client only, never redirected.
	StateMismatch,
	RedirectUriMismatch,
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl Error {
	/// The stable OAuth2/OIDC wire error code (RFC 6749 §5.2 style) used
	/// both in JSON error bodies and in-redirect `error=` parameters.
	fn wire_code(&self) -> &'static str {
		match self {
			Error::InvalidRequest(_) => "invalid_request",
			Error::InvalidClient(_) => "invalid_client",
			Error::InvalidGrant(_) => "invalid_grant",
			Error::UnauthorizedClient(_) => "unauthorized_client",
			Error::UnsupportedGrantType(_) => "unsupported_grant_type",
			Error::UnsupportedResponseType(_) => "unsupported_response_type",
			Error::InvalidScope(_) => "invalid_scope",
			Error::AccessDenied(_) => "access_denied",
			Error::LoginRequired => "login_required",
			Error::ConsentRequired => "consent_required",
			Error::InteractionRequired => "interaction_required",
			Error::TemporarilyUnavailable(_) => "temporarily_unavailable",
			Error::AuthorizationPending => "authorization_pending",
			Error::SlowDown => "slow_down",
			Error::ExpiredToken(_) => "expired_token",
			// Everything orchestrator/fatal-level collapses to server_error at the wire.
			_ => "server_error",
		}
	}

	/// True when this error may safely be delivered via the client's
	/// redirect URI (§7 "Redirect-URI validation for errors"). State and
	/// redirect-URI mismatches must never be redirected since the URI
	/// itself is untrusted at that point.
	pub fn is_redirectable(&self) -> bool {
		!matches!(self, Error::StateMismatch | Error::RedirectUriMismatch)
	}

	pub fn description(&self) -> String {
		match self {
			Error::InvalidRequest(m)
			| Error::InvalidClient(m)
			| Error::InvalidGrant(m)
			| Error::UnauthorizedClient(m)
			| Error::UnsupportedGrantType(m)
			| Error::UnsupportedResponseType(m)
			| Error::InvalidScope(m)
			| Error::AccessDenied(m)
			| Error::ServerError(m)
			| Error::TemporarilyUnavailable(m)
			| Error::InvalidPolicy(m)
			| Error::StepTimeout(m)
			| Error::StepConfigError(m)
			| Error::ExpiredToken(m) => m.clone(),
			Error::AuthorizationPending => "authorization pending".into(),
			Error::SlowDown => "polling too frequently".into(),
			Error::LoginRequired => "login required".into(),
			Error::ConsentRequired => "consent required".into(),
			Error::InteractionRequired => "interaction required".into(),
			Error::JourneyNotFound => "journey not found".into(),
			Error::JourneyExpired => "journey expired".into(),
			Error::NoPolicy => "no matching journey policy".into(),
			Error::NoSigningCredentials | Error::KeyDecryptFailed => {
				"internal server error".into()
			}
			Error::StateMismatch => "state parameter mismatch".into(),
			Error::RedirectUriMismatch => "redirect_uri does not match the registered value".into(),
			other => other.to_string(),
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, code, message) = match self {
			Error::NotFound => (
				StatusCode::NOT_FOUND,
				"E-CORE-NOTFOUND".to_string(),
				"Resource not found".to_string(),
			),
			Error::PermissionDenied => (
				StatusCode::FORBIDDEN,
				"E-AUTH-NOPERM".to_string(),
				"You do not have permission to access this resource".to_string(),
			),
			Error::Unauthorized => (
				StatusCode::UNAUTHORIZED,
				"E-AUTH-UNAUTH".to_string(),
				"Authentication required or invalid token".to_string(),
			),
			Error::ValidationError(msg) => (
				StatusCode::BAD_REQUEST,
				"E-VAL-INVALID".to_string(),
				format!("Request validation failed: {}", msg),
			),
			Error::Conflict(msg) => (
				StatusCode::CONFLICT,
				"E-CORE-CONFLICT".to_string(),
				format!("Resource conflict: {}", msg),
			),
			Error::PreconditionRequired(msg) => (
				StatusCode::PRECONDITION_REQUIRED,
				"E-POW-REQUIRED".to_string(),
				format!("Precondition required: {}", msg),
			),
			Error::Timeout => (
				StatusCode::REQUEST_TIMEOUT,
				"E-NET-TIMEOUT".to_string(),
				"Request timeout".to_string(),
			),
			Error::ServiceUnavailable(msg) => (
				StatusCode::SERVICE_UNAVAILABLE,
				"E-SYS-UNAVAIL".to_string(),
				format!("Service temporarily unavailable: {}", msg),
			),
			Error::DbError => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CORE-DBERR".to_string(),
				"Internal server error".to_string(),
			),
			Error::Internal(msg) => {
				warn!("internal error: {}", msg);
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-CORE-INTERNAL".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::Parse => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CORE-PARSE".to_string(),
				"Internal server error".to_string(),
			),
			Error::Io(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-SYS-IO".to_string(),
				"Internal server error".to_string(),
			),
			Error::NetworkError(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-NET-ERROR".to_string(),
				"Internal server error".to_string(),
			),
			Error::CryptoError(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CRYPT-FAIL".to_string(),
				"Internal server error".to_string(),
			),
			Error::ConfigError(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CONF-CFGERR".to_string(),
				"Internal server error".to_string(),
			),

			Error::InvalidRequest(ref m) => (StatusCode::BAD_REQUEST, "invalid_request".to_string(), m.clone()),
			Error::InvalidClient(ref m) => (StatusCode::UNAUTHORIZED, "invalid_client".to_string(), m.clone()),
			Error::InvalidGrant(ref m) => (StatusCode::BAD_REQUEST, "invalid_grant".to_string(), m.clone()),
			Error::UnauthorizedClient(ref m) => {
				(StatusCode::BAD_REQUEST, "unauthorized_client".to_string(), m.clone())
			}
			Error::UnsupportedGrantType(ref m) => {
				(StatusCode::BAD_REQUEST, "unsupported_grant_type".to_string(), m.clone())
			}
			Error::UnsupportedResponseType(ref m) => {
				(StatusCode::BAD_REQUEST, "unsupported_response_type".to_string(), m.clone())
			}
			Error::InvalidScope(ref m) => (StatusCode::BAD_REQUEST, "invalid_scope".to_string(), m.clone()),
			Error::AccessDenied(ref m) => (StatusCode::FORBIDDEN, "access_denied".to_string(), m.clone()),
			Error::LoginRequired => {
				(StatusCode::BAD_REQUEST, "login_required".to_string(), "login required".to_string())
			}
			Error::ConsentRequired => {
				(StatusCode::BAD_REQUEST, "consent_required".to_string(), "consent required".to_string())
			}
			Error::InteractionRequired => (
				StatusCode::BAD_REQUEST,
				"interaction_required".to_string(),
				"interaction required".to_string(),
			),
			Error::TemporarilyUnavailable(ref m) => {
				(StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable".to_string(), m.clone())
			}
			Error::ServerError(ref m) => {
				warn!("protocol server_error: {}", m);
				(StatusCode::INTERNAL_SERVER_ERROR, "server_error".to_string(), "server error".to_string())
			}
			Error::AuthorizationPending => (
				StatusCode::BAD_REQUEST,
				"authorization_pending".to_string(),
				"authorization pending".to_string(),
			),
			Error::SlowDown => {
				(StatusCode::BAD_REQUEST, "slow_down".to_string(), "polling too frequently".to_string())
			}
			Error::ExpiredToken(ref m) => {
				(StatusCode::BAD_REQUEST, "expired_token".to_string(), m.clone())
			}

			Error::JourneyNotFound => {
				(StatusCode::NOT_FOUND, "E-JRNY-NOTFOUND".to_string(), "Journey not found".to_string())
			}
			Error::JourneyExpired => {
				(StatusCode::GONE, "E-JRNY-EXPIRED".to_string(), "Journey has expired".to_string())
			}
			Error::NoPolicy => (
				StatusCode::UNPROCESSABLE_ENTITY,
				"E-JRNY-NOPOLICY".to_string(),
				"No matching journey policy".to_string(),
			),
			Error::InvalidPolicy(ref m) => {
				warn!("invalid journey policy: {}", m);
				(
					StatusCode::UNPROCESSABLE_ENTITY,
					"E-JRNY-BADPOLICY".to_string(),
					"Journey policy is invalid".to_string(),
				)
			}
			Error::StepTimeout(ref m) => {
				(StatusCode::REQUEST_TIMEOUT, "E-JRNY-STEPTIMEOUT".to_string(), m.clone())
			}
			Error::StepConfigError(ref m) => {
				warn!("step config error: {}", m);
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-JRNY-STEPCFG".to_string(),
					"Internal server error".to_string(),
				)
			}

			Error::NoSigningCredentials => {
				warn!("no active signing credentials available");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-KEYS-NOCRED".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::KeyDecryptFailed => {
				warn!("signing key decryption failed");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-KEYS-DECRYPT".to_string(),
					"Internal server error".to_string(),
				)
			}

			Error::StateMismatch => {
				(StatusCode::BAD_REQUEST, "E-PROTO-STATE".to_string(), "state parameter mismatch".to_string())
			}
			Error::RedirectUriMismatch => (
				StatusCode::BAD_REQUEST,
				"E-PROTO-REDIRECTURI".to_string(),
				"redirect_uri does not match the registered value".to_string(),
			),
		};

		let error_response = ErrorResponse::new(code, message);
		(status, Json(error_response)).into_response()
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(err: std::num::ParseIntError) -> Self {
		warn!("parse int error: {}", err);
		Error::Parse
	}
}

impl From<std::time::SystemTimeError> for Error {
	fn from(err: std::time::SystemTimeError) -> Self {
		warn!("system time error: {}", err);
		Error::ServiceUnavailable("system time error".into())
	}
}

impl From<axum::Error> for Error {
	fn from(err: axum::Error) -> Self {
		warn!("axum error: {}", err);
		Error::NetworkError("axum error".into())
	}
}

impl From<axum::http::Error> for Error {
	fn from(err: axum::http::Error) -> Self {
		warn!("http error: {}", err);
		Error::NetworkError("http error".into())
	}
}

impl From<axum::http::header::ToStrError> for Error {
	fn from(err: axum::http::header::ToStrError) -> Self {
		warn!("header to str error: {}", err);
		Error::Parse
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("json error: {}", err);
		Error::Parse
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", err);
		Error::ServiceUnavailable("task execution failed".into())
	}
}

impl From<jsonwebtoken::errors::Error> for Error {
	fn from(err: jsonwebtoken::errors::Error) -> Self {
		warn!("jwt error: {}", err);
		Error::Unauthorized
	}
}

impl From<x509_parser::asn1_rs::Err<x509_parser::error::X509Error>> for Error {
	fn from(err: x509_parser::asn1_rs::Err<x509_parser::error::X509Error>) -> Self {
		warn!("x509 error: {}", err);
		Error::CryptoError("X.509 certificate error".into())
	}
}

impl From<rustls::Error> for Error {
	fn from(err: rustls::Error) -> Self {
		warn!("rustls error: {}", err);
		Error::CryptoError("TLS error".into())
	}
}

impl From<rustls_pki_types::pem::Error> for Error {
	fn from(err: rustls_pki_types::pem::Error) -> Self {
		warn!("pem error: {}", err);
		Error::CryptoError("PEM parsing error".into())
	}
}

impl From<webauthn_rs::prelude::WebauthnError> for Error {
	fn from(err: webauthn_rs::prelude::WebauthnError) -> Self {
		warn!("webauthn error: {:?}", err);
		Error::Unauthorized
	}
}

/// Lock a `std::sync::Mutex`, converting poisoning into `Error::Internal`.
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".into()))
	};
	($mutex:expr, $context:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal(format!("mutex poisoned: {}", $context)))
	};
}

// vim: ts=4
