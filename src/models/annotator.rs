//! Batched corpus annotation

use crate::metrics::AnnotationMetrics;
use crate::types::Corpus;
use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};
use tracing::debug;

/// Anything that can annotate a batch of serialized documents.
///
/// Implementations must return exactly one annotated document per input,
/// in input order.
pub trait Annotator {
    /// Annotate one batch
    fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>>;

    /// Name used in log messages
    fn name(&self) -> &str;

    /// Time the last `annotate` call spent inside the backend itself, when
    /// the annotator measures it. `None` means the whole call is counted.
    fn session_time(&self) -> Option<Duration> {
        None
    }
}

impl<A: Annotator + ?Sized> Annotator for Box<A> {
    fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        (**self).annotate(batch)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn session_time(&self) -> Option<Duration> {
        (**self).session_time()
    }
}

/// Annotate a corpus in contiguous batches of at most `batch_size`.
///
/// The annotator is called `ceil(N / batch_size)` times and the results are
/// concatenated in batch order. Only time spent inside `annotate` is
/// recorded in `metrics`, narrowed to [`Annotator::session_time`] when the
/// annotator reports one.
pub fn annotate_corpus<A: Annotator + ?Sized>(
    annotator: &mut A,
    corpus: &Corpus,
    batch_size: usize,
    metrics: &mut AnnotationMetrics,
) -> Result<Vec<Vec<u8>>> {
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }

    let mut annotated = Vec::with_capacity(corpus.len());

    for (index, batch) in corpus.batches(batch_size).enumerate() {
        let start_time = Instant::now();
        let output = annotator
            .annotate(batch)
            .with_context(|| format!("{} failed on batch {}", annotator.name(), index))?;
        let elapsed = annotator.session_time().unwrap_or_else(|| start_time.elapsed());

        if output.len() != batch.len() {
            bail!(
                "{} returned {} documents for a batch of {}",
                annotator.name(),
                output.len(),
                batch.len()
            );
        }

        let bytes_in: usize = batch.iter().map(Vec::len).sum();
        let bytes_out: usize = output.iter().map(Vec::len).sum();
        metrics.record_batch(batch.len(), bytes_in, bytes_out, elapsed);

        debug!(
            batch = index,
            docs = batch.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Batch annotated"
        );

        annotated.extend(output);
    }

    Ok(annotated)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverses every document and remembers batch sizes
    struct Reverser {
        calls: Vec<usize>,
    }

    impl Annotator for Reverser {
        fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
            self.calls.push(batch.len());
            Ok(batch
                .iter()
                .map(|doc| doc.iter().rev().copied().collect())
                .collect())
        }

        fn name(&self) -> &str {
            "reverser"
        }
    }

    struct Dropper;

    impl Annotator for Dropper {
        fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
            Ok(batch.iter().skip(1).cloned().collect())
        }

        fn name(&self) -> &str {
            "dropper"
        }
    }

    /// Reports a fixed backend time regardless of wall clock
    struct Timed;

    impl Annotator for Timed {
        fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(batch.to_vec())
        }

        fn name(&self) -> &str {
            "timed"
        }

        fn session_time(&self) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }
    }

    fn corpus(n: usize) -> Corpus {
        Corpus::new("mem", (0..n).map(|i| format!("doc{}", i).into_bytes()).collect())
    }

    #[test]
    fn test_call_count_is_ceil_of_batches() {
        for (n, batch_size, expected) in [(0, 4, 0), (1, 4, 1), (4, 4, 1), (5, 4, 2), (9, 2, 5), (3, 1024, 1)] {
            let mut annotator = Reverser { calls: Vec::new() };
            let mut metrics = AnnotationMetrics::new();
            let annotated = annotate_corpus(&mut annotator, &corpus(n), batch_size, &mut metrics).unwrap();

            assert_eq!(annotator.calls.len(), expected, "n={} batch_size={}", n, batch_size);
            assert_eq!(annotated.len(), n);
            assert_eq!(metrics.batch_count(), expected);
            assert!(annotator.calls.iter().all(|&size| size <= batch_size));
        }
    }

    #[test]
    fn test_results_preserve_input_order() {
        let input = corpus(7);
        let mut annotator = Reverser { calls: Vec::new() };
        let mut metrics = AnnotationMetrics::new();

        let annotated = annotate_corpus(&mut annotator, &input, 3, &mut metrics).unwrap();

        assert_eq!(annotator.calls, vec![3, 3, 1]);
        for (doc, result) in input.documents().iter().zip(&annotated) {
            let expected: Vec<u8> = doc.iter().rev().copied().collect();
            assert_eq!(result, &expected);
        }
        assert_eq!(metrics.document_count(), 7);
    }

    #[test]
    fn test_short_output_is_an_error() {
        let mut metrics = AnnotationMetrics::new();
        let err = annotate_corpus(&mut Dropper, &corpus(3), 2, &mut metrics).unwrap_err();
        assert!(err.to_string().contains("returned 1 documents for a batch of 2"));
    }

    #[test]
    fn test_zero_batch_size_is_an_error() {
        let mut annotator = Reverser { calls: Vec::new() };
        let mut metrics = AnnotationMetrics::new();
        assert!(annotate_corpus(&mut annotator, &corpus(3), 0, &mut metrics).is_err());
        assert!(annotator.calls.is_empty());
    }

    #[test]
    fn test_reported_session_time_is_recorded() {
        let mut metrics = AnnotationMetrics::new();
        annotate_corpus(&mut Timed, &corpus(5), 2, &mut metrics).unwrap();

        assert_eq!(metrics.batch_count(), 3);
        assert_eq!(metrics.annotation_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_boxed_annotator() {
        let mut annotator: Box<dyn Annotator> = Box::new(Reverser { calls: Vec::new() });
        let mut metrics = AnnotationMetrics::new();
        let annotated = annotate_corpus(&mut annotator, &corpus(2), 8, &mut metrics).unwrap();
        assert_eq!(annotated[0], b"0cod".to_vec());
    }
}
