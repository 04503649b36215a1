//! Decision statistics for the loan pipeline.

use crate::types::decision::{DecisionLabel, OverrideReason};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline decisions
pub struct DecisionMetrics {
    /// Requests that produced a decision
    pub decisions: AtomicU64,
    pub approved: AtomicU64,
    pub rejected: AtomicU64,
    /// Decisions where an override changed the model's label
    pub overridden: AtomicU64,
    /// Identical applications not persisted again
    pub duplicates_suppressed: AtomicU64,
    pub persistence_failures: AtomicU64,
    /// Failed requests by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Fired override rules by reason
    overrides_by_reason: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// P(approve) distribution buckets
    approval_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self {
            decisions: AtomicU64::new(0),
            approved: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            overridden: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            overrides_by_reason: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            approval_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed decision
    pub fn record_decision(
        &self,
        processing_time: Duration,
        p_approve: f64,
        final_label: DecisionLabel,
        overrides: &[OverrideReason],
        overridden: bool,
    ) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        match final_label {
            DecisionLabel::Approved => self.approved.fetch_add(1, Ordering::Relaxed),
            DecisionLabel::Rejected => self.rejected.fetch_add(1, Ordering::Relaxed),
        };
        if overridden {
            self.overridden.fetch_add(1, Ordering::Relaxed);
        }

        if !overrides.is_empty() {
            if let Ok(mut by_reason) = self.overrides_by_reason.write() {
                for reason in overrides {
                    *by_reason.entry(reason.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }

        self.record_latency(processing_time);

        let bucket = (p_approve.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.approval_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a request that ended with an error
    pub fn record_failure(&self, kind: &str, processing_time: Duration) {
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
        self.record_latency(processing_time);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Share of decisions that ended Approved, in percent
    pub fn get_approval_rate(&self) -> f64 {
        let decisions = self.decisions.load(Ordering::Relaxed);
        if decisions == 0 {
            return 0.0;
        }
        self.approved.load(Ordering::Relaxed) as f64 / decisions as f64 * 100.0
    }

    /// Current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let failures: u64 = self.get_failures_by_kind().values().sum();
        if elapsed > 0.0 {
            (self.decisions.load(Ordering::Relaxed) + failures) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_overrides_by_reason(&self) -> HashMap<String, u64> {
        self.overrides_by_reason
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_approval_distribution(&self) -> [u64; 10] {
        self.approval_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let decisions = self.decisions.load(Ordering::Relaxed);
        let approved = self.approved.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let overridden = self.overridden.load(Ordering::Relaxed);
        let duplicates = self.duplicates_suppressed.load(Ordering::Relaxed);
        let persistence_failures = self.persistence_failures.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let failures = self.get_failures_by_kind();
        let overrides = self.get_overrides_by_reason();
        let distribution = self.get_approval_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            LOAN DECISION PIPELINE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Decisions: {:>8}  │  Approved: {:>6}  │  Rejected: {:>6}   ║",
            decisions, approved, rejected
        );
        info!(
            "║ Approval Rate: {:>5.1}%  │  Overridden: {:>6}  │  Throughput: {:>6.1}/s ║",
            self.get_approval_rate(),
            overridden,
            self.get_throughput()
        );
        info!(
            "║ Duplicates suppressed: {:>6}  │  Persistence failures: {:>6} ║",
            duplicates, persistence_failures
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Overrides by Rule:                                           ║");
        for (reason, count) in &overrides {
            info!("║   {:24}: {:>6}                           ║", reason, count);
        }
        info!("║ Failures by Kind:                                            ║");
        for (kind, count) in &failures {
            info!("║   {:24}: {:>6}                           ║", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ P(approve) Distribution:                                     ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for DecisionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<DecisionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<DecisionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_recording() {
        let metrics = DecisionMetrics::new();

        metrics.record_decision(
            Duration::from_micros(100),
            0.8,
            DecisionLabel::Approved,
            &[],
            false,
        );
        metrics.record_decision(
            Duration::from_micros(200),
            0.9,
            DecisionLabel::Rejected,
            &[OverrideReason::CreditScoreFloor],
            true,
        );
        metrics.record_failure("validation", Duration::from_micros(10));
        metrics.record_duplicate();

        assert_eq!(metrics.decisions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.approved.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.overridden.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.duplicates_suppressed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_failures_by_kind().get("validation"), Some(&1));
        assert_eq!(
            metrics.get_overrides_by_reason().get("credit_score_floor"),
            Some(&1)
        );
        assert!((metrics.get_approval_rate() - 50.0).abs() < 1e-9);
        assert_eq!(metrics.get_processing_stats().count, 3);
    }

    #[test]
    fn test_distribution_buckets() {
        let metrics = DecisionMetrics::new();
        for p in [0.05, 0.45, 0.95, 1.0] {
            metrics.record_decision(
                Duration::from_micros(50),
                p,
                DecisionLabel::Approved,
                &[],
                false,
            );
        }

        let distribution = metrics.get_approval_distribution();
        assert_eq!(distribution[0], 1);
        assert_eq!(distribution[4], 1);
        assert_eq!(distribution[9], 2);
    }
}
