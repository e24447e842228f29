//! Top-level router: nests every protocol crate's own router under the
//! shared `App` state (§6 EXTERNAL INTERFACES).

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::prelude::*;

async fn healthz() -> &'static str {
	"ok"
}

async fn not_found() -> Error {
	Error::NotFound
}

pub fn router(app: App) -> Router {
	Router::new()
		.route("/healthz", get(healthz))
		.merge(idplat_oidc::routes::router())
		.merge(idplat_saml::routes::router())
		.fallback(not_found)
		.layer(CorsLayer::very_permissive())
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
