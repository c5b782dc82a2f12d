//! Audit Metrics
//!
//! Counters for both pipelines, registered against a caller-supplied
//! `prometheus::Registry`. The embedding process owns the registry and its
//! exposition; the core only increments. There is deliberately no global
//! registry use here; observability state is constructed and passed in.

use prometheus::{IntCounter, Registry};

use crate::error::{Error, Result};

/// Counters shared by the auditor and the checker.
#[derive(Clone)]
pub struct AuditMetrics {
    /// Stripe audits started.
    pub audits_total: IntCounter,
    /// Stripe audits that ended in a fatal error.
    pub audit_failures_total: IntCounter,
    /// Shares successfully downloaded.
    pub shares_downloaded_total: IntCounter,
    /// Shares whose download failed (recorded per share, audit continues).
    pub share_download_failures_total: IntCounter,
    /// Shares whose content disagreed with the reconstructed stripe.
    pub altered_shares_total: IntCounter,
    /// Checker scan passes started.
    pub checker_scans_total: IntCounter,
    /// Checker scan passes aborted with an error.
    pub checker_scan_failures_total: IntCounter,
    /// Metadata entries visited by the checker.
    pub segments_visited_total: IntCounter,
    /// Injured segments handed to the repair queue.
    pub injured_segments_enqueued_total: IntCounter,
}

impl AuditMetrics {
    /// Create the counters and register them with `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self::detached()?;
        for collector in [
            &metrics.audits_total,
            &metrics.audit_failures_total,
            &metrics.shares_downloaded_total,
            &metrics.share_download_failures_total,
            &metrics.altered_shares_total,
            &metrics.checker_scans_total,
            &metrics.checker_scan_failures_total,
            &metrics.segments_visited_total,
            &metrics.injured_segments_enqueued_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .map_err(|e| Error::Internal(format!("metric registration failed: {}", e)))?;
        }
        Ok(metrics)
    }

    /// Create the counters without registering them anywhere. Used by tests
    /// and by embedders that wire their own collectors.
    pub fn detached() -> Result<Self> {
        let counter = |name: &str, help: &str| {
            IntCounter::new(name, help)
                .map_err(|e| Error::Internal(format!("metric creation failed: {}", e)))
        };
        Ok(Self {
            audits_total: counter("veristor_audits_total", "Stripe audits started")?,
            audit_failures_total: counter(
                "veristor_audit_failures_total",
                "Stripe audits ended in a fatal error",
            )?,
            shares_downloaded_total: counter(
                "veristor_shares_downloaded_total",
                "Shares successfully downloaded",
            )?,
            share_download_failures_total: counter(
                "veristor_share_download_failures_total",
                "Share downloads that failed",
            )?,
            altered_shares_total: counter(
                "veristor_altered_shares_total",
                "Shares whose content disagreed with the reconstructed stripe",
            )?,
            checker_scans_total: counter("veristor_checker_scans_total", "Checker passes started")?,
            checker_scan_failures_total: counter(
                "veristor_checker_scan_failures_total",
                "Checker passes aborted with an error",
            )?,
            segments_visited_total: counter(
                "veristor_segments_visited_total",
                "Metadata entries visited by the checker",
            )?,
            injured_segments_enqueued_total: counter(
                "veristor_injured_segments_enqueued_total",
                "Injured segments handed to the repair queue",
            )?,
        })
    }
}
