//! Annotation timing and throughput statistics.

use std::time::Duration;
use tracing::info;

/// Collects per-batch statistics for one annotation pass.
///
/// Only time spent inside the session call is recorded; corpus and
/// archive I/O are excluded.
#[derive(Debug, Default)]
pub struct AnnotationMetrics {
    /// Documents sent to the session
    documents: u64,
    /// Input payload bytes
    bytes_in: u64,
    /// Output payload bytes
    bytes_out: u64,
    /// Session call time per batch
    batch_times: Vec<Duration>,
}

impl AnnotationMetrics {
    /// Create an empty metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed session call
    pub fn record_batch(&mut self, documents: usize, bytes_in: usize, bytes_out: usize, elapsed: Duration) {
        self.documents += documents as u64;
        self.bytes_in += bytes_in as u64;
        self.bytes_out += bytes_out as u64;
        self.batch_times.push(elapsed);
    }

    /// Total time spent inside the session call
    pub fn annotation_time(&self) -> Duration {
        self.batch_times.iter().sum()
    }

    pub fn batch_count(&self) -> usize {
        self.batch_times.len()
    }

    pub fn document_count(&self) -> u64 {
        self.documents
    }

    /// Documents per second of session time
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.annotation_time().as_secs_f64();
        if elapsed > 0.0 {
            self.documents as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get batch latency statistics
    pub fn get_batch_stats(&self) -> BatchStats {
        if self.batch_times.is_empty() {
            return BatchStats::default();
        }

        let mut sorted: Vec<u64> = self.batch_times.iter().map(|d| d.as_micros() as u64).collect();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        BatchStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let stats = self.get_batch_stats();

        info!(
            "Wall clock time for {} annotation: {:.6} seconds",
            self.documents,
            self.annotation_time().as_secs_f64()
        );
        info!(
            batches = stats.count,
            mean_us = stats.mean_us,
            p50_us = stats.p50_us,
            p95_us = stats.p95_us,
            max_us = stats.max_us,
            "Batch latency"
        );
        info!(
            throughput = format!("{:.1} docs/s", self.get_throughput()),
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            "Annotation throughput"
        );
    }
}

/// Batch latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let mut metrics = AnnotationMetrics::new();

        metrics.record_batch(4, 400, 800, Duration::from_micros(100));
        metrics.record_batch(2, 200, 300, Duration::from_micros(300));

        assert_eq!(metrics.document_count(), 6);
        assert_eq!(metrics.batch_count(), 2);
        assert_eq!(metrics.annotation_time(), Duration::from_micros(400));

        let stats = metrics.get_batch_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = AnnotationMetrics::new();
        assert_eq!(metrics.get_batch_stats(), BatchStats::default());
        assert_eq!(metrics.get_throughput(), 0.0);
    }
}
