//! Process setup shared by both binaries.
use std::path::Path;

/// Load `.env` (or `env_file`), then install the tracing subscriber, so a
/// `RUST_LOG` set in the env file takes effect.
pub fn init(env_file: Option<&Path>) {
    if let Some(path) = env_file {
        dotenvy::from_path(path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}
