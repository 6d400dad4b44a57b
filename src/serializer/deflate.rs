//! Deflate compression stage using `flate2`

use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use tracing::debug;

use crate::traits::TransformStage;

const STORED: u8 = 0;
const DEFLATED: u8 = 1;

/// Compresses payloads at or above a size threshold
///
/// Every output starts with one header byte telling whether the rest is
/// deflated, so small values pay a single byte and no CPU.
#[derive(Debug, Clone)]
pub struct DeflateStage {
    threshold: usize,
    level: Compression,
}

impl DeflateStage {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            level: Compression::default(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level);
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl TransformStage for DeflateStage {
    fn encode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if bytes.len() < self.threshold {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(STORED);
            out.extend_from_slice(&bytes);
            return Ok(out);
        }

        let mut encoder = DeflateEncoder::new(vec![DEFLATED], self.level);
        encoder.write_all(&bytes).context("deflate write failed")?;
        let out = encoder.finish().context("deflate finish failed")?;
        debug!(
            original = bytes.len(),
            compressed = out.len(),
            "[Deflate] Compressed payload"
        );
        Ok(out)
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let Some((header, body)) = bytes.split_first() else {
            bail!("empty payload");
        };
        match *header {
            STORED => Ok(body.to_vec()),
            DEFLATED => {
                let mut out = Vec::new();
                DeflateDecoder::new(body)
                    .read_to_end(&mut out)
                    .context("inflate failed")?;
                Ok(out)
            }
            other => bail!("unknown compression header {other}"),
        }
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_is_stored() {
        let stage = DeflateStage::new(1024);
        let out = stage.encode(b"small".to_vec()).unwrap();
        assert_eq!(out.first(), Some(&STORED));
        assert_eq!(out.len(), 6);
        assert_eq!(stage.decode(out).unwrap(), b"small");
    }

    #[test]
    fn test_at_threshold_is_deflated() {
        let stage = DeflateStage::new(64);
        let input = vec![b'a'; 4096];
        let out = stage.encode(input.clone()).unwrap();
        assert_eq!(out.first(), Some(&DEFLATED));
        assert!(out.len() < input.len());
        assert_eq!(stage.decode(out).unwrap(), input);
    }

    #[test]
    fn test_rejects_unknown_header() {
        let stage = DeflateStage::new(0);
        assert!(stage.decode(vec![9, 1, 2]).is_err());
        assert!(stage.decode(Vec::new()).is_err());
    }
}
