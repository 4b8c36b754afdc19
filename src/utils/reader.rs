//! Log file reader with transparent decompression.
//!
//! Rotated SFTP logs usually arrive gzip- or zstd-compressed; the reader
//! picks a decoder from the file extension so every command can take
//! `.log`, `.gz`, and `.zst` inputs interchangeably.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open a log file for buffered line reading, decompressing `.gz` and
/// `.zst` by extension.
pub fn open_log(path: impl AsRef<Path>) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open log file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        Some("zst") => {
            let decoder = zstd::Decoder::new(file).with_context(|| {
                format!("Failed to create zstd decoder for: {}", path.display())
            })?;
            Ok(Box::new(BufReader::new(decoder)))
        }
        _ => Ok(Box::new(BufReader::new(file))),
    }
}
