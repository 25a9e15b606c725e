//! # Prometheus Metrics
//!
//! Operational counters for the key service, scraped at `/metrics` on the
//! dedicated metrics port. Everything lives in a private registry with the
//! `anarchy_auth` prefix.
//!
//! Labels are low-cardinality by construction: derivation method and
//! verification outcome. Session ids and keys never become label values.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use anarchy_auth::derivation::DerivationMethod;

/// Outcome label values for `verifications_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid,
    Rejected,
}

impl VerifyOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            VerifyOutcome::Valid => "valid",
            VerifyOutcome::Invalid => "invalid",
            VerifyOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    /// Sessions opened, by derivation method.
    pub sessions_created_total: IntCounterVec,
    /// Sessions that `get` would currently return.
    pub active_sessions: IntGauge,
    /// Detached signatures produced.
    pub signatures_total: IntCounter,
    /// Verification requests, by outcome.
    pub verifications_total: IntCounterVec,
    /// Derivations that fell back to the image hash.
    pub extraction_fallbacks_total: IntCounter,
    /// Time from upload received to session created.
    pub derivation_latency_seconds: Histogram,
}

impl AuthMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("anarchy_auth".into()), None)?;

        let sessions_created_total = IntCounterVec::new(
            Opts::new("sessions_created_total", "Sessions created, by derivation method"),
            &["method"],
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let active_sessions = IntGauge::new("active_sessions", "Sessions currently live")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let signatures_total =
            IntCounter::new("signatures_total", "Detached signatures produced")?;
        registry.register(Box::new(signatures_total.clone()))?;

        let verifications_total = IntCounterVec::new(
            Opts::new("verifications_total", "Signature verifications, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(verifications_total.clone()))?;

        let extraction_fallbacks_total = IntCounter::new(
            "extraction_fallbacks_total",
            "Derivations that used the raw image hash instead of iris codes",
        )?;
        registry.register(Box::new(extraction_fallbacks_total.clone()))?;

        // Iris pipelines take seconds; hashing a file takes milliseconds.
        // The buckets cover both.
        let derivation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "derivation_latency_seconds",
                "Image upload to session creation latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(derivation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            sessions_created_total,
            active_sessions,
            signatures_total,
            verifications_total,
            extraction_fallbacks_total,
            derivation_latency_seconds,
        })
    }

    pub fn record_session(&self, method: DerivationMethod) {
        self.sessions_created_total
            .with_label_values(&[method.as_str()])
            .inc();
        if !method.is_biometric() {
            self.extraction_fallbacks_total.inc();
        }
    }

    pub fn record_verification(&self, outcome: VerifyOutcome) {
        self.verifications_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<AuthMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
