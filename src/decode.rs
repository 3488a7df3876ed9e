use crate::{
    constants::*,
    error::{CodecError, ErrorKind},
    float,
    value::Value,
    Codec,
};
use std::io::Read;

/// Per-call decoder state: the byte source and the running offset used for
/// error reporting. All configuration lives on the [`Codec`](crate::Codec).
pub(crate) struct Decoder<'a, R> {
    codec: &'a Codec,
    source: R,
    offset: u64,
}

fn major_name(major: u8) -> &'static str {
    match major {
        MAJOR_POS => "unsigned integer",
        MAJOR_NEG => "negative integer",
        MAJOR_BYTES => "byte string",
        MAJOR_STR => "text string",
        MAJOR_ARRAY => "array",
        MAJOR_DICT => "map",
        MAJOR_TAG => "tag",
        _ => "simple value",
    }
}

/// Merge a handler substitution into a chunk accumulator where the payload
/// type allows it; anything else drops the malformed chunk.
fn splice(major: u8, buf: &mut Vec<u8>, substitute: Value) {
    match (major, substitute) {
        (MAJOR_BYTES, Value::Bytes(b)) => buf.extend_from_slice(&b),
        (MAJOR_STR, Value::Str(s)) => buf.extend_from_slice(s.as_bytes()),
        _ => {}
    }
}

impl<'a, R: Read> Decoder<'a, R> {
    pub fn new(codec: &'a Codec, source: R) -> Self {
        Self {
            codec,
            source,
            offset: 0,
        }
    }

    /// Read one top-level item; an empty source yields the configured
    /// sentinel.
    pub fn decode_top(&mut self) -> Result<Value, CodecError> {
        match self.try_read_byte()? {
            Some(header) => self.decode_with_header(header),
            None => match &self.codec.eof {
                Some(sentinel) => Ok(sentinel.clone()),
                None => Err(self.fatal(ErrorKind::Underflow, "input is empty")),
            },
        }
    }

    fn fatal(&self, kind: ErrorKind, message: impl Into<String>) -> CodecError {
        CodecError::new(kind, message).at(self.offset)
    }

    /// Route a recoverable problem through the injected handler. `Ok` is the
    /// substitute value for the malformed construct (which the caller has
    /// fully consumed), `Err` unwinds with the offset attached.
    fn recover(&self, kind: ErrorKind, message: impl Into<String>) -> Result<Value, CodecError> {
        (self.codec.handler)(kind, message.into()).map_err(|e| e.at(self.offset))
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>, CodecError> {
        let mut buf = [0u8; 1];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fatal(ErrorKind::Io, e.to_string())),
            }
        }
    }

    fn read_byte(&mut self, what: &str) -> Result<u8, CodecError> {
        self.try_read_byte()?.ok_or_else(|| {
            self.fatal(
                ErrorKind::Underflow,
                format!("ran out of bytes while reading {}", what),
            )
        })
    }

    fn read_exact(&mut self, mut buf: &mut [u8], what: &str) -> Result<(), CodecError> {
        while !buf.is_empty() {
            match self.source.read(buf) {
                Ok(0) => {
                    return Err(self.fatal(
                        ErrorKind::Underflow,
                        format!("ran out of bytes while reading {}", what),
                    ))
                }
                Ok(n) => {
                    self.offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fatal(ErrorKind::Io, e.to_string())),
            }
        }
        Ok(())
    }

    /// The unsigned argument following the header byte. Info values 28..=31
    /// must be filtered by the caller.
    fn read_argument(&mut self, info: u8, what: &str) -> Result<u64, CodecError> {
        match info {
            n if n < 24 => Ok(u64::from(n)),
            24 => {
                let mut b = [0u8; 1];
                self.read_exact(&mut b, what)?;
                Ok(u64::from(b[0]))
            }
            25 => {
                let mut b = [0u8; 2];
                self.read_exact(&mut b, what)?;
                Ok(u64::from(u16::from_be_bytes(b)))
            }
            26 => {
                let mut b = [0u8; 4];
                self.read_exact(&mut b, what)?;
                Ok(u64::from(u32::from_be_bytes(b)))
            }
            27 => {
                let mut b = [0u8; 8];
                self.read_exact(&mut b, what)?;
                Ok(u64::from_be_bytes(b))
            }
            _ => unreachable!(),
        }
    }

    /// Read a declared number of payload bytes without trusting the header:
    /// allocation grows in bounded steps so a hostile length cannot reserve
    /// arbitrary memory up front.
    fn read_payload(&mut self, len: u64, what: &str) -> Result<Vec<u8>, CodecError> {
        let len = usize::try_from(len).map_err(|_| {
            self.fatal(
                ErrorKind::Underflow,
                format!("declared length {} exceeds the address space", len),
            )
        })?;
        let step = self.codec.max_preallocation.max(1);
        let mut buf = Vec::with_capacity(len.min(step));
        while buf.len() < len {
            let chunk = (len - buf.len()).min(step);
            let start = buf.len();
            buf.resize(start + chunk, 0);
            self.read_exact(&mut buf[start..], what)?;
        }
        Ok(buf)
    }

    fn decode_item(&mut self) -> Result<Value, CodecError> {
        let header = self.read_byte("item header")?;
        self.decode_with_header(header)
    }

    fn decode_with_header(&mut self, header: u8) -> Result<Value, CodecError> {
        let (major, info) = (header >> 5, header & 31);
        if (28..=30).contains(&info) {
            return self.recover(
                ErrorKind::ReservedLength,
                format!("info value {} is reserved", info),
            );
        }
        if info == INDEFINITE_SIZE {
            return match major {
                MAJOR_BYTES | MAJOR_STR => self.chunks(major),
                MAJOR_ARRAY => self.streaming_array(),
                MAJOR_DICT => self.streaming_dict(),
                MAJOR_TAG => {
                    self.recover(ErrorKind::IllegalStream, "tags cannot be indefinite")
                }
                MAJOR_LIT => self.recover(
                    ErrorKind::UnexpectedBreak,
                    "break outside of a streaming context",
                ),
                _ => self.recover(
                    ErrorKind::IllegalStream,
                    format!("{} cannot be indefinite", major_name(major)),
                ),
            };
        }
        let argument = self.read_argument(info, "header argument")?;
        match major {
            MAJOR_POS => Ok(Value::Pos(argument)),
            MAJOR_NEG => Ok(Value::Neg(argument)),
            MAJOR_BYTES => Ok(Value::Bytes(self.read_payload(argument, "byte string")?)),
            MAJOR_STR => {
                let bytes = self.read_payload(argument, "text string")?;
                self.utf8(bytes)
            }
            MAJOR_ARRAY => self.array(argument),
            MAJOR_DICT => self.dict(argument),
            MAJOR_TAG => self.tagged(argument),
            MAJOR_LIT => self.literal(info, argument),
            _ => unreachable!(),
        }
    }

    fn utf8(&self, bytes: Vec<u8>) -> Result<Value, CodecError> {
        match String::from_utf8(bytes) {
            Ok(s) => Ok(Value::Str(s)),
            Err(e) => self.recover(ErrorKind::InvalidUtf8, e.utf8_error().to_string()),
        }
    }

    fn literal(&mut self, info: u8, argument: u64) -> Result<Value, CodecError> {
        match info {
            LIT_FALSE => Ok(Value::Bool(false)),
            LIT_TRUE => Ok(Value::Bool(true)),
            LIT_NULL => Ok(Value::Null),
            LIT_UNDEFINED => Ok(Value::Undefined),
            LIT_SIMPLE => {
                let code = argument as u8;
                if (20..=31).contains(&code) {
                    self.recover(
                        ErrorKind::ReservedSimple,
                        format!("two-byte simple value {} is reserved", code),
                    )
                } else {
                    Ok(Value::Simple(code))
                }
            }
            LIT_FLOAT16 => Ok(Value::Float(float::half_to_f64(argument as u16))),
            LIT_FLOAT32 => Ok(Value::Float(f64::from(f32::from_bits(argument as u32)))),
            LIT_FLOAT64 => Ok(Value::Float(f64::from_bits(argument))),
            x => Ok(Value::Simple(x)),
        }
    }

    fn array(&mut self, len: u64) -> Result<Value, CodecError> {
        let cap = usize::try_from(len)
            .unwrap_or(usize::MAX)
            .min(self.codec.max_preallocation / std::mem::size_of::<Value>());
        let mut items = Vec::with_capacity(cap);
        for _ in 0..len {
            items.push(self.decode_item()?);
        }
        Ok(Value::Array(items))
    }

    fn dict(&mut self, len: u64) -> Result<Value, CodecError> {
        let cap = usize::try_from(len)
            .unwrap_or(usize::MAX)
            .min(self.codec.max_preallocation / (2 * std::mem::size_of::<Value>()));
        let mut pairs = Vec::with_capacity(cap);
        for _ in 0..len {
            let key = self.decode_item()?;
            let value = self.decode_item()?;
            self.insert_pair(&mut pairs, key, value)?;
        }
        Ok(Value::Dict(pairs))
    }

    fn insert_pair(
        &mut self,
        pairs: &mut Vec<(Value, Value)>,
        key: Value,
        value: Value,
    ) -> Result<(), CodecError> {
        if pairs.iter().any(|(k, _)| *k == key) {
            if self.codec.strict_keys {
                // substitution keeps the first occurrence and drops the pair
                self.recover(
                    ErrorKind::DuplicateMapKey,
                    format!("duplicate map key {}", key),
                )?;
            }
            return Ok(());
        }
        pairs.push((key, value));
        Ok(())
    }

    fn streaming_array(&mut self) -> Result<Value, CodecError> {
        let mut items = Vec::new();
        loop {
            let header = self.read_byte("array item")?;
            if header == STOP_BYTE {
                return Ok(Value::Array(items));
            }
            items.push(self.decode_with_header(header)?);
        }
    }

    fn streaming_dict(&mut self) -> Result<Value, CodecError> {
        let mut pairs = Vec::new();
        loop {
            let header = self.read_byte("map key")?;
            if header == STOP_BYTE {
                return Ok(Value::Dict(pairs));
            }
            let key = self.decode_with_header(header)?;
            let header = self.read_byte("map value")?;
            if header == STOP_BYTE {
                let value = self.recover(
                    ErrorKind::MissingMapValue,
                    format!("streaming map ended after key {}", key),
                )?;
                self.insert_pair(&mut pairs, key, value)?;
                return Ok(Value::Dict(pairs));
            }
            let value = self.decode_with_header(header)?;
            self.insert_pair(&mut pairs, key, value)?;
        }
    }

    /// Accumulate the chunks of a streaming (byte) string. Chunks must be
    /// definite-length strings of the same major type.
    fn chunks(&mut self, major: u8) -> Result<Value, CodecError> {
        let mut buf = Vec::new();
        loop {
            let header = self.read_byte("string chunk")?;
            if header == STOP_BYTE {
                break;
            }
            let (chunk_major, chunk_info) = (header >> 5, header & 31);
            if chunk_major != major {
                self.decode_with_header(header)?;
                let substitute = self.recover(
                    ErrorKind::IllegalChunk,
                    format!(
                        "streaming {} contains a {} chunk",
                        major_name(major),
                        major_name(chunk_major)
                    ),
                )?;
                splice(major, &mut buf, substitute);
                continue;
            }
            if (28..=30).contains(&chunk_info) {
                let substitute = self.recover(
                    ErrorKind::ReservedLength,
                    format!("info value {} is reserved", chunk_info),
                )?;
                splice(major, &mut buf, substitute);
                continue;
            }
            if chunk_info == INDEFINITE_SIZE {
                self.chunks(major)?;
                let substitute = self.recover(
                    ErrorKind::DefiniteLengthRequired,
                    "streaming strings require definite-length chunks",
                )?;
                splice(major, &mut buf, substitute);
                continue;
            }
            let len = self.read_argument(chunk_info, "string chunk")?;
            let mut chunk = self.read_payload(len, "string chunk")?;
            buf.append(&mut chunk);
        }
        if major == MAJOR_BYTES {
            Ok(Value::Bytes(buf))
        } else {
            self.utf8(buf)
        }
    }

    fn tagged(&mut self, tag: u64) -> Result<Value, CodecError> {
        if tag == TAG_SELF_DESCRIBED {
            return self.decode_item();
        }
        let inner = self.decode_item()?;
        let result = match self.codec.registry.reader(tag) {
            Some(read) => read(tag, inner),
            None => self.codec.registry.read_unknown(tag, inner),
        };
        result.or_else(|e| match e.kind() {
            ErrorKind::Underflow | ErrorKind::Io => Err(e.at(self.offset)),
            kind => self.recover(kind, e.message().to_owned()),
        })
    }
}
