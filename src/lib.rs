pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod utils;

/// Install the `tracing` subscriber shared by both shells.
/// `RUST_LOG` overrides the default `downtube=info` filter.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("downtube=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
