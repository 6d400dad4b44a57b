//! Serializer Pipeline
//!
//! A [`Serializer`] is a codec followed by an ordered chain of byte
//! [`TransformStage`]s. Writing runs the codec and then every stage in
//! insertion order; reading runs the stages in reverse and then the codec.
//!
//! ```rust
//! use cache_repository::{JsonCodec, Serializer};
//!
//! # fn example() -> anyhow::Result<()> {
//! let serializer = Serializer::new(JsonCodec);
//! let bytes = serializer.serialize(&vec![1, 2, 3])?;
//! let back: Vec<i32> = serializer.deserialize(&bytes)?;
//! assert_eq!(back, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "encryption")]
mod aes;
#[cfg(feature = "compression")]
mod deflate;

#[cfg(feature = "encryption")]
#[cfg_attr(docsrs, doc(cfg(feature = "encryption")))]
pub use aes::AesGcmStage;
#[cfg(feature = "compression")]
#[cfg_attr(docsrs, doc(cfg(feature = "compression")))]
pub use deflate::DeflateStage;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::traits::{CacheCodec, TransformStage};

/// Codec plus byte stages
pub struct Serializer<C: CacheCodec> {
    codec: C,
    stages: Vec<Arc<dyn TransformStage>>,
}

impl<C: CacheCodec> Serializer<C> {
    /// Pipeline consisting of the codec alone.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            stages: Vec::new(),
        }
    }

    /// Append a stage; stages encode in the order they are added.
    #[must_use]
    pub fn with_stage(mut self, stage: impl TransformStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append a shared stage.
    #[must_use]
    pub fn with_shared_stage(mut self, stage: Arc<dyn TransformStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Deflate payloads of at least `threshold` bytes.
    #[cfg(feature = "compression")]
    #[must_use]
    pub fn compressed(self, threshold: usize) -> Self {
        self.with_stage(DeflateStage::new(threshold))
    }

    /// Encrypt payloads with AES-256-GCM.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not 32 bytes long.
    #[cfg(feature = "encryption")]
    pub fn encrypted(self, key: &[u8]) -> Result<Self> {
        Ok(self.with_stage(AesGcmStage::new(key)?))
    }

    /// # Errors
    ///
    /// Returns an error if the codec or any stage fails.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let mut bytes = self
            .codec
            .serialize(value)
            .with_context(|| format!("{} codec failed to encode", self.codec.name()))?;
        for stage in &self.stages {
            bytes = stage
                .encode(bytes)
                .with_context(|| format!("{} stage failed to encode", stage.name()))?;
        }
        Ok(bytes)
    }

    /// # Errors
    ///
    /// Returns an error if any stage or the codec rejects the bytes.
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let mut bytes = bytes.to_vec();
        for stage in self.stages.iter().rev() {
            bytes = stage
                .decode(bytes)
                .with_context(|| format!("{} stage failed to decode", stage.name()))?;
        }
        self.codec
            .deserialize(&bytes)
            .with_context(|| format!("{} codec failed to decode", self.codec.name()))
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Pipeline description such as `bson+deflate+aes-256-gcm`.
    pub fn describe(&self) -> String {
        std::iter::once(self.codec.name())
            .chain(self.stages.iter().map(|s| s.name()))
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl<C: CacheCodec + Clone> Clone for Serializer<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            stages: self.stages.clone(),
        }
    }
}

impl<C: CacheCodec> fmt::Debug for Serializer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("pipeline", &self.describe())
            .finish()
    }
}
