pub mod archive;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use archive::{Archive, ArchiveError};
pub use config::ArchiveConfig;
pub use models::{AnalysisStatus, Classification, ClassificationPatch, Document};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
/// Calling it twice is harmless.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("DigiArch v{} logging initialised", config::APP_VERSION);
    }
}
