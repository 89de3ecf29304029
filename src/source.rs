//! Reading whole WSI files into memory.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::WsiResult;

/// Reads an input file, decompressing it if the name ends in `.gz`.
pub fn read_input(path: impl AsRef<Path>) -> WsiResult<Vec<u8>> {
    let path = path.as_ref();
    let raw = fs::read(path)?;

    let is_gzip = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));
    if !is_gzip {
        debug!("Read {} bytes from {}", raw.len(), path.display());
        return Ok(raw);
    }

    let data = decompress_gzip(&raw)?;
    debug!(
        "Read {} bytes from {} ({} compressed)",
        data.len(),
        path.display(),
        raw.len()
    );
    Ok(data)
}

/// Decompresses gzip data.
pub fn decompress_gzip(data: &[u8]) -> WsiResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}
