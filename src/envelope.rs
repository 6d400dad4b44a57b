//! Stored value model
//!
//! Values reach a backend in one of two shapes. Without a serializer they are
//! kept as a native [`serde_json::Value`]; with one they are wrapped in a
//! [`CacheItem`] envelope carrying the type name and the serializer output.
//!
//! The type name is descriptive. Whether an envelope can be read as `T` is
//! decided by the serializer; the name only classifies a failed decode as a
//! [`CacheError::TypeMismatch`].

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::serializer::Serializer;
use crate::traits::CacheCodec;

/// Envelope for serialized values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    /// Type name of the value at write time, see [`type_tag`]
    pub item_type: String,
    /// Serializer pipeline output, opaque to the repository
    #[serde(with = "serde_bytes")]
    pub item_data: Vec<u8>,
}

impl CacheItem {
    pub fn new(item_type: impl Into<String>, item_data: Vec<u8>) -> Self {
        Self {
            item_type: item_type.into(),
            item_data,
        }
    }
}

/// Owned type name written into an envelope for values of type `T`.
///
/// References are stripped and borrowed forms map to their owned types
/// (`&str` becomes `String`, `[T]` becomes `Vec<T>`), so the tag a value is
/// written with matches the type it is normally read back as.
#[must_use]
pub fn type_tag<T: ?Sized>() -> String {
    owned_type_name(type_name::<T>())
}

fn owned_type_name(name: &str) -> String {
    let mut name = name.trim();
    while let Some(rest) = name.strip_prefix('&') {
        name = rest.trim_start_matches("mut ").trim_start();
    }
    if name == "str" {
        return type_name::<String>().to_string();
    }
    if let Some(element) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
        // Arrays (`[T; N]`) keep their name
        if !element.contains(';') {
            return format!("alloc::vec::Vec<{}>", owned_type_name(element));
        }
    }
    name.to_string()
}

/// What a repository hands to its backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    /// Backend-native value, written when no serializer is configured
    Native(serde_json::Value),
    /// Serialized value in its envelope
    Wrapped(CacheItem),
}

impl StoredValue {
    /// Build the stored form of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if the value cannot be encoded.
    pub fn encode<T, C>(key: &str, value: &T, serializer: Option<&Serializer<C>>) -> CacheResult<Self>
    where
        T: Serialize + ?Sized,
        C: CacheCodec,
    {
        match serializer {
            Some(serializer) => {
                let item_data =
                    serializer
                        .serialize(value)
                        .map_err(|source| CacheError::Serialization {
                            key: key.to_string(),
                            source,
                        })?;
                Ok(Self::Wrapped(CacheItem::new(type_tag::<T>(), item_data)))
            }
            None => serde_json::to_value(value)
                .map(Self::Native)
                .map_err(|e| CacheError::Serialization {
                    key: key.to_string(),
                    source: e.into(),
                }),
        }
    }

    /// Recover a `T` from the stored form.
    ///
    /// Native values pass through whether or not a serializer is configured.
    /// Envelopes need a serializer, which decodes `item_data` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SerializerMissing`] without a serializer. A failed
    /// decode is a [`CacheError::TypeMismatch`] when the envelope was written
    /// for another type and [`CacheError::Deserialization`] otherwise.
    pub fn decode<T, C>(self, key: &str, serializer: Option<&Serializer<C>>) -> CacheResult<T>
    where
        T: DeserializeOwned,
        C: CacheCodec,
    {
        match self {
            Self::Native(value) => {
                serde_json::from_value(value).map_err(|e| CacheError::Deserialization {
                    key: key.to_string(),
                    source: e.into(),
                })
            }
            Self::Wrapped(item) => {
                let Some(serializer) = serializer else {
                    return Err(CacheError::SerializerMissing {
                        key: key.to_string(),
                    });
                };
                serializer.deserialize(&item.item_data).map_err(|source| {
                    let requested = type_name::<T>();
                    if item.item_type == type_tag::<T>() {
                        CacheError::Deserialization {
                            key: key.to_string(),
                            source,
                        }
                    } else {
                        CacheError::TypeMismatch {
                            key: key.to_string(),
                            stored: item.item_type,
                            requested,
                        }
                    }
                })
            }
        }
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }
}
