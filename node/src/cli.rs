//! # CLI Interface
//!
//! Defines the command-line argument structure for `anarchy-auth-node`
//! using `clap` derive. Every `run` flag can also be set through an
//! `ANARCHY_*` environment variable, which is how containers configure it.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

use anarchy_auth::config::{
    ServiceConfig, DEFAULT_EXTRACTION_TIMEOUT, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL,
    MAX_IMAGE_BYTES,
};

/// Anarchy Auth key service.
///
/// Derives an Ed25519 keypair from an uploaded iris image, holds it in
/// memory for a short session, and signs with it on request. Nothing is
/// written to disk.
#[derive(Parser, Debug)]
#[command(
    name = "anarchy-auth-node",
    about = "Anarchy Auth biometric key service",
    version,
    propagate_version = true
)]
pub struct AnarchyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address the HTTP API listens on.
    #[arg(long, env = "ANARCHY_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ANARCHY_METRICS_PORT", default_value_t = 9102)]
    pub metrics_port: u16,

    /// Session lifetime in seconds, measured from creation.
    #[arg(long, env = "ANARCHY_SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL.as_secs())]
    pub session_ttl_secs: u64,

    /// Budget for one feature extraction, in seconds. Slower extractions
    /// fall back to the image hash.
    #[arg(long, env = "ANARCHY_EXTRACTION_TIMEOUT_SECS", default_value_t = DEFAULT_EXTRACTION_TIMEOUT.as_secs())]
    pub extraction_timeout_secs: u64,

    /// How often expired sessions are swept, in seconds.
    #[arg(long, env = "ANARCHY_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    pub sweep_interval_secs: u64,

    /// Command line of an external iris feature extractor. It receives the
    /// image on stdin and prints `left:<hex>` / `right:<hex>` lines.
    ///
    /// When unset, every key is derived from a hash of the raw image.
    #[arg(long, env = "ANARCHY_EXTRACTOR_CMD")]
    pub extractor_cmd: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "ANARCHY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Largest accepted image upload, in bytes.
    #[arg(long, env = "ANARCHY_MAX_UPLOAD_BYTES", default_value_t = MAX_IMAGE_BYTES)]
    pub max_upload_bytes: usize,
}

impl RunArgs {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            extraction_timeout: Duration::from_secs(self.extraction_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}
