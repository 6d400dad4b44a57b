//! Cache Codec Implementations
//!
//! This module provides built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec) trait
//! for different serialization backends.

mod json;
pub use json::JsonCodec;

mod msgpack;
pub use msgpack::MsgPackCodec;

#[cfg(feature = "bincode")]
mod bincode;
#[cfg(feature = "bincode")]
#[cfg_attr(docsrs, doc(cfg(feature = "bincode")))]
pub use self::bincode::BincodeCodec;

#[cfg(feature = "bson")]
mod bson;
#[cfg(feature = "bson")]
#[cfg_attr(docsrs, doc(cfg(feature = "bson")))]
pub use self::bson::BsonCodec;
