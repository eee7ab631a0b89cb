pub mod backend; // Hosted-backend collaborators (HTTP + in-memory)
pub mod config;
pub mod models;
pub mod pipeline; // Ingestion + diagnosis pipeline
pub mod session; // Current-user context
pub mod workflow; // Intake → Upload → Confirm → Result controller

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`config::default_log_filter`].
/// Calling it twice is harmless: the second install is ignored.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
