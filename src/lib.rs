#![doc = include_str!("../README.md")]

use std::io::{Read, Write};

pub mod constants;
mod decode;
mod encode;
mod error;
mod float;
mod registry;
pub mod value;


pub use error::{CodecError, ErrorHandler, ErrorKind};
pub use registry::{ReadHandler, Shape, TagRegistry, WriteHandler};
pub use value::{BigInt, BigRational, Decimal, Timestamp, Value};

use error::abort_handler;

/// A configured encoder/decoder pair.
///
/// Construction is cheap and the result is immutable: `encode` and `decode`
/// take `&self` and keep their per-call state on the stack, so one `Codec`
/// can serve any number of concurrent operations on distinct sources and
/// sinks without locking.
///
/// ```
/// use cbor_codec::{Codec, Value};
///
/// let codec = Codec::new();
/// let mut out = Vec::new();
/// let written = codec.encode(&mut out, &Value::from(1000i64)).unwrap();
/// assert_eq!(out, [0x19, 0x03, 0xe8]);
/// assert_eq!(written, 3);
/// assert_eq!(codec.decode(&mut &out[..]).unwrap(), Value::Pos(1000));
/// ```
pub struct Codec {
    pub(crate) registry: TagRegistry,
    pub(crate) canonical: bool,
    pub(crate) strict_keys: bool,
    pub(crate) eof: Option<Value>,
    pub(crate) max_preallocation: usize,
    pub(crate) handler: ErrorHandler,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// The default configuration: built-in tag handlers, canonical output,
    /// strict map keys, no EOF sentinel, aborting error handler, and a
    /// 64 KiB preallocation ceiling.
    pub fn new() -> Self {
        Self {
            registry: TagRegistry::default(),
            canonical: true,
            strict_keys: true,
            eof: None,
            max_preallocation: 64 * 1024,
            handler: abort_handler(),
        }
    }

    /// Toggle canonical map-key ordering; with `false`, map entries keep
    /// their insertion order.
    pub fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Toggle duplicate-map-key detection. With `false`, duplicates are
    /// dropped silently and the first occurrence wins.
    pub fn with_strict_keys(mut self, strict_keys: bool) -> Self {
        self.strict_keys = strict_keys;
        self
    }

    /// Value returned by [`decode`](#method.decode) when the source is empty
    /// before the first byte; without one, an empty source is an `Underflow`
    /// error.
    pub fn with_eof(mut self, sentinel: Value) -> Self {
        self.eof = Some(sentinel);
        self
    }

    /// Replace the aborting default error handler, e.g. with a lenient one
    /// that substitutes a replacement value and continues.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Replace the tag registry.
    pub fn with_registry(mut self, registry: TagRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Ceiling for any single up-front buffer allocation during decoding.
    /// Larger declared lengths still decode; their buffers grow in steps, so
    /// a hostile header cannot reserve arbitrary memory.
    pub fn with_max_preallocation(mut self, bytes: usize) -> Self {
        self.max_preallocation = bytes;
        self
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Mutable access for registering tags before first use.
    pub fn registry_mut(&mut self) -> &mut TagRegistry {
        &mut self.registry
    }

    /// Encode one value to the sink, returning the number of bytes written.
    pub fn encode<W: Write>(&self, sink: &mut W, value: &Value) -> Result<usize, CodecError> {
        let buf = self.encode_to_vec(value)?;
        sink.write_all(&buf)
            .map_err(|e| CodecError::new(ErrorKind::Io, e.to_string()))?;
        Ok(buf.len())
    }

    /// Encode one value into a fresh byte vector.
    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        encode::Encoder::new(self).encode_value(&mut buf, value)?;
        Ok(buf)
    }

    /// Decode exactly one value from the source. Bytes after the top-level
    /// item are left unread, so repeated calls walk a sequence of items.
    pub fn decode<R: Read>(&self, source: &mut R) -> Result<Value, CodecError> {
        decode::Decoder::new(self, source).decode_top()
    }

    /// Decode a byte slice holding exactly one value; trailing bytes are an
    /// error.
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut source = bytes;
        let value = self.decode(&mut source)?;
        if source.is_empty() {
            Ok(value)
        } else {
            Err(CodecError::new(
                ErrorKind::IllegalStream,
                format!("{} trailing bytes after the top-level item", source.len()),
            )
            .at((bytes.len() - source.len()) as u64))
        }
    }
}

/// Encode with the default [`Codec`](struct.Codec.html).
///
/// ```
/// use cbor_codec::{decode_from_slice, encode_to_vec, BigInt, Value};
///
/// let bytes = encode_to_vec(&Value::from(1000i64)).unwrap();
/// assert_eq!(bytes, [0x19, 0x03, 0xe8]);
///
/// // 2^64 exceeds the wire integer range and round-trips as tag 2
/// let big = Value::integer(BigInt::from(u64::MAX) + 1u8);
/// let bytes = encode_to_vec(&big).unwrap();
/// assert_eq!(bytes[0], 0xc2);
/// assert_eq!(decode_from_slice(&bytes).unwrap(), big);
/// ```
pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>, CodecError> {
    Codec::new().encode_to_vec(value)
}

/// Decode with the default [`Codec`](struct.Codec.html); trailing bytes are
/// an error.
pub fn decode_from_slice(bytes: &[u8]) -> Result<Value, CodecError> {
    Codec::new().decode_slice(bytes)
}
