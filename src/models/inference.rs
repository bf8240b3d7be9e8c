//! ONNX Runtime annotator
//!
//! Documents are opaque byte strings of varying length, so a batch crosses
//! the session boundary as a zero-padded `u8` matrix plus a vector of row
//! lengths. The annotated batch comes back in the same shape:
//!
//! | tensor                   | type | shape    |
//! |--------------------------|------|----------|
//! | `<input>`                | u8   | `[N, L]` |
//! | `<input>_lengths`        | i64  | `[N]`    |
//! | `<output>`               | u8   | `[N, M]` |
//! | `<output>_lengths`       | i64  | `[N]`    |

use crate::models::annotator::Annotator;
use crate::models::loader::LoadedModel;
use anyhow::{anyhow, bail, Context, Result};
use ort::value::Tensor;
use std::time::{Duration, Instant};

/// Suffix of the row-length companion of each byte tensor
pub const LENGTHS_SUFFIX: &str = "_lengths";

/// A batch of documents laid out for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBatch {
    /// `[rows, width]`
    pub shape: Vec<i64>,
    /// Row-major, zero padded to `width`
    pub data: Vec<u8>,
    /// Unpadded length of each row
    pub lengths: Vec<i64>,
}

/// Lay a batch out as a zero-padded matrix.
///
/// The width is at least 1 so a batch of empty documents still has a
/// non-degenerate shape.
pub fn pack_batch(batch: &[Vec<u8>]) -> PackedBatch {
    let width = batch.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut data = vec![0u8; batch.len() * width];

    for (row, document) in batch.iter().enumerate() {
        let start = row * width;
        data[start..start + document.len()].copy_from_slice(document);
    }

    PackedBatch {
        shape: vec![batch.len() as i64, width as i64],
        data,
        lengths: batch.iter().map(|d| d.len() as i64).collect(),
    }
}

/// Split a padded output matrix back into documents
pub fn unpack_batch(shape: &[i64], data: &[u8], lengths: &[i64]) -> Result<Vec<Vec<u8>>> {
    let (rows, width) = match shape {
        [rows, width] if *rows >= 0 && *width >= 0 => (*rows as usize, *width as usize),
        _ => bail!("expected a [rows, width] annotation tensor, got shape {:?}", shape),
    };

    if data.len() != rows * width {
        bail!(
            "annotation tensor holds {} bytes, shape {:?} needs {}",
            data.len(),
            shape,
            rows * width
        );
    }
    if lengths.len() != rows {
        bail!("got {} lengths for {} annotated rows", lengths.len(), rows);
    }

    lengths
        .iter()
        .enumerate()
        .map(|(row, &length)| {
            if length < 0 || length as usize > width {
                bail!("row {} has length {} outside [0, {}]", row, length, width);
            }
            let start = row * width;
            Ok(data[start..start + length as usize].to_vec())
        })
        .collect()
}

/// Annotator backed by a restored ONNX Runtime session
pub struct OnnxAnnotator {
    model: LoadedModel,
    input_lengths_name: String,
    output_lengths_name: String,
    /// Duration of the last `session.run`
    last_run: Option<Duration>,
}

impl OnnxAnnotator {
    /// Wrap a loaded model
    pub fn new(model: LoadedModel) -> Self {
        let input_lengths_name = format!("{}{}", model.input_name, LENGTHS_SUFFIX);
        let output_lengths_name = format!("{}{}", model.output_name, LENGTHS_SUFFIX);
        Self {
            model,
            input_lengths_name,
            output_lengths_name,
            last_run: None,
        }
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }
}

impl Annotator for OnnxAnnotator {
    fn annotate(&mut self, batch: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let packed = pack_batch(batch);
        let rows = batch.len() as i64;

        let documents =
            Tensor::from_array((packed.shape, packed.data)).context("Failed to create input tensor")?;
        let lengths =
            Tensor::from_array((vec![rows], packed.lengths)).context("Failed to create lengths tensor")?;

        self.last_run = None;
        let run_start = Instant::now();
        let outputs = self.model.session.run(ort::inputs![
            self.model.input_name.as_str() => documents,
            self.input_lengths_name.as_str() => lengths
        ])?;
        self.last_run = Some(run_start.elapsed());

        let annotations = outputs
            .get(self.model.output_name.as_str())
            .ok_or_else(|| anyhow!("Session produced no '{}' output", self.model.output_name))?;
        let (shape, data) = annotations
            .try_extract_tensor::<u8>()
            .with_context(|| format!("'{}' is not a u8 tensor", self.model.output_name))?;

        let annotation_lengths = outputs
            .get(self.output_lengths_name.as_str())
            .ok_or_else(|| anyhow!("Session produced no '{}' output", self.output_lengths_name))?;
        let (_, lengths) = annotation_lengths
            .try_extract_tensor::<i64>()
            .with_context(|| format!("'{}' is not an i64 tensor", self.output_lengths_name))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        unpack_batch(&dims, data, lengths)
    }

    fn name(&self) -> &str {
        &self.model.name
    }

    fn session_time(&self) -> Option<Duration> {
        self.last_run
    }
}
