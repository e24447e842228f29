//! HTTPS listener: binds `axum-server`'s rustls acceptor with a single
//! self-signed certificate generated at startup. The teacher's
//! `CertResolver` did per-SNI-hostname lookups against a certificate
//! cache for a multi-tenant-domain reverse proxy; standalone mode here
//! serves one issuer, so that lookup collapses to one fixed cert.

use std::net::SocketAddr;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::prelude::*;

pub async fn serve(listen: &str, router: Router, cert_pem: &str, key_pem: &str) -> ClResult<()> {
	let addr: SocketAddr = listen
		.parse()
		.map_err(|e| Error::ConfigError(format!("invalid listen address '{listen}': {e}")))?;

	let tls_config = RustlsConfig::from_pem(cert_pem.as_bytes().to_vec(), key_pem.as_bytes().to_vec())
		.await
		.map_err(|e| Error::Internal(format!("failed to load TLS certificate: {e}")))?;

	info!("listening on https://{addr}");
	axum_server::bind_rustls(addr, tls_config)
		.serve(router.into_make_service())
		.await
		.map_err(|e| Error::Internal(format!("HTTPS server error: {e}")))
}

// vim: ts=4
