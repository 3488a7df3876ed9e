use crate::value::Value;
use std::fmt::{Debug, Display};

/// Classification of a codec failure.
///
/// Every error carries one of these kinds plus a human-readable message; the
/// kind is stable and intended for programmatic matching (see
/// [`keyword`](#method.keyword)), the message is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// info values 28, 29 and 30 of the item header are reserved
    ReservedLength,
    /// two-byte simple values must use codes 0..=19 or 32..=255
    ReservedSimple,
    /// a chunk of a streaming string had the wrong major type
    IllegalChunk,
    /// structurally ill-formed input, e.g. an indefinite-length tag
    IllegalStream,
    /// streaming strings require definite-length chunks
    DefiniteLengthRequired,
    /// break byte 0xff outside of a streaming context
    UnexpectedBreak,
    /// a map key appeared twice at the same level
    DuplicateMapKey,
    /// a streaming map ended after a key, before its value
    MissingMapValue,
    /// the input ended in the middle of an item
    Underflow,
    /// a text string contained invalid UTF-8
    InvalidUtf8,
    /// an integer argument does not fit 64 bits and no bignum handler applies
    UnrepresentableInteger,
    /// a tag without a registered read handler (informational)
    UnknownTag,
    /// a value without a registered write handler
    UnknownValue,
    /// an I/O failure of the underlying byte source or sink
    Io,
}

impl ErrorKind {
    /// The stable keyword for this kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            ErrorKind::ReservedLength => "reserved-length",
            ErrorKind::ReservedSimple => "reserved-simple",
            ErrorKind::IllegalChunk => "illegal-chunk",
            ErrorKind::IllegalStream => "illegal-stream",
            ErrorKind::DefiniteLengthRequired => "definite-length-required",
            ErrorKind::UnexpectedBreak => "unexpected-break",
            ErrorKind::DuplicateMapKey => "duplicate-map-key",
            ErrorKind::MissingMapValue => "missing-map-value",
            ErrorKind::Underflow => "underflow",
            ErrorKind::InvalidUtf8 => "invalid-utf8",
            ErrorKind::UnrepresentableInteger => "unrepresentable-integer",
            ErrorKind::UnknownTag => "unknown-tag",
            ErrorKind::UnknownValue => "unknown-value",
            ErrorKind::Io => "io",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Error container for encoding and decoding problems.
///
/// Decoder errors carry the byte offset at which the problem was detected;
/// encoder errors have no offset.
#[derive(Clone, PartialEq, Eq)]
pub struct CodecError {
    kind: ErrorKind,
    message: String,
    offset: Option<u64>,
}

impl CodecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    /// Attach a byte offset unless one is already present.
    pub(crate) fn at(mut self, offset: u64) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    /// Get the error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the input at which the error was detected, if known.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " at offset {}", offset)?;
        }
        Ok(())
    }
}

impl Debug for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for CodecError {}

/// Injectable error policy.
///
/// The codec calls the handler with the kind and message of every recoverable
/// problem. Returning `Ok(value)` substitutes `value` for the malformed
/// construct and processing continues after it; returning `Err` unwinds the
/// whole call. `Underflow` and `Io` are fatal and bypass the handler.
pub type ErrorHandler = Box<dyn Fn(ErrorKind, String) -> Result<Value, CodecError> + Send + Sync>;

pub(crate) fn abort_handler() -> ErrorHandler {
    Box::new(|kind, message| Err(CodecError::new(kind, message)))
}
