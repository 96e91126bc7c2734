//! Metrics and instrumentation for the ledger.
//!
//! This module defines Prometheus-compatible metrics for the node.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::sync::Arc;
//! use ledger::metrics::MetricsRegistry;
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! registry.ledger.mining_seconds.observe(duration_secs);
//! println!("{}", registry.gather_text());
//! ```

pub mod prometheus;

pub use prometheus::{LedgerMetrics, MetricsRegistry};
