//! Prometheus-backed ledger metrics.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed ledger metrics. There is no
//! exporter; callers render the text format with
//! [`MetricsRegistry::gather_text`] and ship it however they like.

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Ledger-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by the node.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Transactions admitted to the mempool.
    pub tx_accepted_total: IntCounter,
    /// Transactions refused by the mempool, labelled by `reason`.
    pub tx_rejected_total: IntCounterVec,
    /// Blocks appended by local finalization.
    pub blocks_finalized_total: IntCounter,
    /// Local chain replaced by a longer valid replica chain.
    pub chain_replacements_total: IntCounter,
    /// Whole-chain validations that failed.
    pub validation_failures_total: IntCounter,
    /// Wall time of one finalization (nonce search or validator stamp).
    pub mining_seconds: Histogram,
    /// Pending transactions right now.
    pub mempool_size: IntGauge,
    /// Number of blocks in the local chain, genesis included.
    pub chain_length: IntGauge,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let tx_accepted_total = IntCounter::with_opts(Opts::new(
            "tx_accepted_total",
            "Total number of transactions admitted to the mempool",
        ))?;
        registry.register(Box::new(tx_accepted_total.clone()))?;

        let tx_rejected_total = IntCounterVec::new(
            Opts::new(
                "tx_rejected_total",
                "Total number of transactions refused by the mempool",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(tx_rejected_total.clone()))?;

        let blocks_finalized_total = IntCounter::with_opts(Opts::new(
            "blocks_finalized_total",
            "Total number of blocks finalized locally",
        ))?;
        registry.register(Box::new(blocks_finalized_total.clone()))?;

        let chain_replacements_total = IntCounter::with_opts(Opts::new(
            "chain_replacements_total",
            "Total number of times the local chain was replaced during reconciliation",
        ))?;
        registry.register(Box::new(chain_replacements_total.clone()))?;

        let validation_failures_total = IntCounter::with_opts(Opts::new(
            "validation_failures_total",
            "Total number of failed whole-chain validations",
        ))?;
        registry.register(Box::new(validation_failures_total.clone()))?;

        // Proof of work at low difficulty is sub-second; stake sealing is
        // near zero. Upper buckets catch high difficulties.
        let mining_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mining_seconds",
                "Time to finalize a candidate block in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0,
            ]),
        )?;
        registry.register(Box::new(mining_seconds.clone()))?;

        let mempool_size =
            IntGauge::with_opts(Opts::new("mempool_size", "Number of pending transactions"))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let chain_length = IntGauge::with_opts(Opts::new(
            "chain_length",
            "Number of blocks in the local chain",
        ))?;
        registry.register(Box::new(chain_length.clone()))?;

        Ok(Self {
            tx_accepted_total,
            tx_rejected_total,
            blocks_finalized_total,
            chain_replacements_total,
            validation_failures_total,
            mining_seconds,
            mempool_size,
            chain_length,
        })
    }

    /// Records the mempool and chain sizes after a state change.
    pub fn observe_sizes(&self, mempool: usize, chain: usize) {
        self.mempool_size.set(mempool as i64);
        self.chain_length.set(chain as i64);
    }
}

/// Wrapper around a Prometheus registry and the ledger metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an `Arc` and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ledger".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
