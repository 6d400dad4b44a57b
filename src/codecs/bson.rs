//! BSON Codec using `bson`

use crate::traits::CacheCodec;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// BSON only encodes documents at the top level, so every value is stored
/// in a single-field document.
#[derive(Serialize)]
struct Slot<'a, T: ?Sized> {
    v: &'a T,
}

#[derive(Deserialize)]
struct OwnedSlot<T> {
    v: T,
}

/// BSON Codec using `bson`
///
/// Byte buffers annotated with `serde_bytes` are written as BSON binary,
/// which keeps large blobs compact.
#[cfg_attr(docsrs, doc(cfg(feature = "bson")))]
#[derive(Debug, Default, Clone)]
pub struct BsonCodec;

impl CacheCodec for BsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let document = bson::to_document(&Slot { v: value }).context("BSON encoding failed")?;
        let mut bytes = Vec::new();
        document
            .to_writer(&mut bytes)
            .context("BSON document write failed")?;
        Ok(bytes)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let mut reader = bytes;
        let document =
            bson::Document::from_reader(&mut reader).context("BSON document read failed")?;
        let slot: OwnedSlot<T> = bson::from_document(document).context("BSON decoding failed")?;
        Ok(slot.v)
    }

    fn name(&self) -> &'static str {
        "bson"
    }
}
