//! Landing run orchestration for samland.

pub mod config;
pub mod fetcher;
pub mod pipeline;

pub use config::{ConfigError, IngestConfig};
pub use fetcher::{resolve_window, ApiRequest, Fetcher};
pub use pipeline::{
    migrate_from_config, report_from_config, run_once_from_config, IngestError, IngestPipeline,
    LandingReport, RunReport, RunState,
};

pub const CRATE_NAME: &str = "samland-sync";
