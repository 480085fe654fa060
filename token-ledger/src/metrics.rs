//! Metrics collection for observability
//!
//! Prometheus collectors on a private registry (one per ledger, so several
//! ledgers can live in one process).
//!
//! # Metrics
//!
//! - `token_ledger_transfers_total{mode}` - Admitted transfers by path
//! - `token_ledger_purchases_opened_total` - Transfers parked in escrow
//! - `token_ledger_settlements_total{outcome}` - Settlement attempts
//! - `token_ledger_prunes_total` - Compaction runs that wrote an aggregate
//! - `token_ledger_pruned_deltas_total` - Deltas folded by compaction
//! - `token_ledger_replay_deltas` - Histogram of deltas scanned per replay

use crate::transfer::TransferMode;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Admitted transfers by mode
    pub transfers_total: IntCounterVec,

    /// Purchases opened
    pub purchases_opened: IntCounter,

    /// Settlement attempts by outcome
    pub settlements_total: IntCounterVec,

    /// Compaction runs that wrote an aggregate
    pub prunes_total: IntCounter,

    /// Deltas removed by compaction
    pub pruned_deltas: IntCounter,

    /// Deltas scanned per balance replay
    pub replay_deltas: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounterVec::new(
            Opts::new("token_ledger_transfers_total", "Admitted transfers by path"),
            &["mode"],
        )?;
        registry.register(Box::new(transfers_total.clone()))?;

        let purchases_opened = IntCounter::new(
            "token_ledger_purchases_opened_total",
            "Transfers parked in escrow",
        )?;
        registry.register(Box::new(purchases_opened.clone()))?;

        let settlements_total = IntCounterVec::new(
            Opts::new("token_ledger_settlements_total", "Settlement attempts"),
            &["outcome"],
        )?;
        registry.register(Box::new(settlements_total.clone()))?;

        let prunes_total = IntCounter::new(
            "token_ledger_prunes_total",
            "Compaction runs that wrote an aggregate",
        )?;
        registry.register(Box::new(prunes_total.clone()))?;

        let pruned_deltas = IntCounter::new(
            "token_ledger_pruned_deltas_total",
            "Deltas folded by compaction",
        )?;
        registry.register(Box::new(pruned_deltas.clone()))?;

        let replay_deltas = Histogram::with_opts(
            HistogramOpts::new("token_ledger_replay_deltas", "Deltas scanned per replay")
                .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        )?;
        registry.register(Box::new(replay_deltas.clone()))?;

        Ok(Self {
            transfers_total,
            purchases_opened,
            settlements_total,
            prunes_total,
            pruned_deltas,
            replay_deltas,
            registry,
        })
    }

    /// Record an admitted transfer
    pub fn record_transfer(&self, mode: TransferMode, data_purchase: bool) {
        self.transfers_total.with_label_values(&[mode.as_str()]).inc();
        if data_purchase {
            self.purchases_opened.inc();
        }
    }

    /// Record a settlement attempt
    pub fn record_settlement(&self, completed: bool) {
        let outcome = if completed { "completed" } else { "rejected" };
        self.settlements_total.with_label_values(&[outcome]).inc();
    }

    /// Record a compaction run
    pub fn record_prune(&self, pruned: usize) {
        if pruned > 0 {
            self.prunes_total.inc();
            self.pruned_deltas.inc_by(pruned as u64);
        }
    }

    /// Record a balance replay
    pub fn record_replay(&self, deltas: usize) {
        self.replay_deltas.observe(deltas as f64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("purchases_opened", &self.purchases_opened.get())
            .field("prunes_total", &self.prunes_total.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.purchases_opened.get(), 0);
        assert_eq!(metrics.prunes_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_transfer(TransferMode::Fast, false);
        assert_eq!(a.transfers_total.with_label_values(&["fast"]).get(), 1);
        assert_eq!(b.transfers_total.with_label_values(&["fast"]).get(), 0);
    }

    #[test]
    fn test_record_transfer() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transfer(TransferMode::Safe, true);
        metrics.record_transfer(TransferMode::Safe, false);
        assert_eq!(metrics.transfers_total.with_label_values(&["safe"]).get(), 2);
        assert_eq!(metrics.purchases_opened.get(), 1);
    }

    #[test]
    fn test_record_settlement_and_prune() {
        let metrics = Metrics::new().unwrap();
        metrics.record_settlement(true);
        metrics.record_settlement(false);
        metrics.record_settlement(false);
        assert_eq!(metrics.settlements_total.with_label_values(&["completed"]).get(), 1);
        assert_eq!(metrics.settlements_total.with_label_values(&["rejected"]).get(), 2);

        metrics.record_prune(0);
        metrics.record_prune(4);
        assert_eq!(metrics.prunes_total.get(), 1);
        assert_eq!(metrics.pruned_deltas.get(), 4);
    }

    #[test]
    fn test_registry_gathers() {
        let metrics = Metrics::new().unwrap();
        metrics.record_replay(3);
        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"token_ledger_replay_deltas".to_string()));
    }
}
