//! Synthetic Corpus Generator
//!
//! Writes a zip corpus of random byte documents. Useful for measuring
//! session throughput when no real corpus is at hand.
//!
//! Usage: synth-corpus [OUTPUT] [COUNT] [MIN_LEN] [MAX_LEN]

use anyhow::{bail, Context};
use rand::Rng;
use std::fs::File;
use std::io::Write;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Random document generator
struct DocumentGenerator {
    rng: rand::rngs::ThreadRng,
    min_len: usize,
    max_len: usize,
}

impl DocumentGenerator {
    fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            rng: rand::thread_rng(),
            min_len,
            max_len,
        }
    }

    fn generate(&mut self) -> Vec<u8> {
        let len = self.rng.gen_range(self.min_len..=self.max_len);
        let mut document = vec![0u8; len];
        self.rng.fill(&mut document[..]);
        document
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_corpus=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("synthetic.zip");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let min_len: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(64);
    let max_len: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(4096);

    if min_len > max_len {
        bail!("MIN_LEN {} exceeds MAX_LEN {}", min_len, max_len);
    }

    info!(
        output = %output,
        count = count,
        min_len = min_len,
        max_len = max_len,
        "Configuration loaded"
    );

    let file = File::create(output).with_context(|| format!("Failed to create {}", output))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut generator = DocumentGenerator::new(min_len, max_len);
    let mut total_bytes = 0usize;

    for i in 0..count {
        let document = generator.generate();
        total_bytes += document.len();

        writer.start_file(format!("doc.{}", i), options)?;
        writer.write_all(&document)?;

        if (i + 1) % 1000 == 0 {
            info!("Wrote {}/{} documents", i + 1, count);
        }
    }

    writer.finish()?;

    info!(
        "Completed! Wrote {} documents ({} bytes) to {}",
        count, total_bytes, output
    );

    Ok(())
}
