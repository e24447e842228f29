use std::env;
use std::path::PathBuf;

use idplat_core::app::{AppBuilderOpts, ServerMode};
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod prelude;
mod routes;
mod webserver;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	let opts = AppBuilderOpts {
		mode: ServerMode::Standalone,
		listen: env::var("LISTEN").unwrap_or_else(|_| "127.0.0.1:8443".to_string()).into_boxed_str(),
		listen_http: None,
		platform_issuer: env::var("PLATFORM_ISSUER").ok().map(String::into_boxed_str),
		dist_dir: PathBuf::from(env::var("DIST_DIR").unwrap_or_else(|_| "./dist".to_string())).into_boxed_path(),
		tmp_dir: PathBuf::from(env::var("TMP_DIR").unwrap_or_else(|_| "./tmp".to_string())).into_boxed_path(),
	};
	let listen = opts.listen.to_string();

	let bootstrapped = match bootstrap::bootstrap(opts).await {
		Ok(b) => b,
		Err(e) => {
			tracing::error!("startup failed: {e}");
			std::process::exit(1);
		}
	};

	let router = routes::router(bootstrapped.app);
	if let Err(e) = webserver::serve(&listen, router, &bootstrapped.tls_cert_pem, &bootstrapped.tls_key_pem).await {
		tracing::error!("server error: {e}");
		std::process::exit(1);
	}
}

// vim: ts=4
