use crate::{
    constants::*,
    error::{CodecError, ErrorKind},
    value::{BigRational, Decimal, Timestamp, Value},
};
use num_bigint::{BigInt, Sign};
use num_traits::{One, Zero};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Discriminant of a [`Value`](value/enum.Value.html), the key of the write
/// handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shape {
    Pos,
    Neg,
    Int,
    Float,
    Bytes,
    Str,
    Array,
    Dict,
    Tagged,
    Bool,
    Null,
    Undefined,
    Simple,
    Decimal,
    Rational,
    Symbol,
    Keyword,
    TaggedLiteral,
    Timestamp,
}

impl Shape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Pos(_) => Shape::Pos,
            Value::Neg(_) => Shape::Neg,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::Bytes(_) => Shape::Bytes,
            Value::Str(_) => Shape::Str,
            Value::Array(_) => Shape::Array,
            Value::Dict(_) => Shape::Dict,
            Value::Tagged(..) => Shape::Tagged,
            Value::Bool(_) => Shape::Bool,
            Value::Null => Shape::Null,
            Value::Undefined => Shape::Undefined,
            Value::Simple(_) => Shape::Simple,
            Value::Decimal(_) => Shape::Decimal,
            Value::Rational(_) => Shape::Rational,
            Value::Symbol(_) => Shape::Symbol,
            Value::Keyword(_) => Shape::Keyword,
            Value::TaggedLiteral(..) => Shape::TaggedLiteral,
            Value::Timestamp(_) => Shape::Timestamp,
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Pos => write!(f, "positive number"),
            Shape::Neg => write!(f, "negative number"),
            Shape::Int => write!(f, "big integer"),
            Shape::Float => write!(f, "floating-point number"),
            Shape::Bytes => write!(f, "byte string"),
            Shape::Str => write!(f, "text string"),
            Shape::Array => write!(f, "array"),
            Shape::Dict => write!(f, "map"),
            Shape::Tagged => write!(f, "tagged value"),
            Shape::Bool => write!(f, "boolean"),
            Shape::Null => write!(f, "null"),
            Shape::Undefined => write!(f, "undefined"),
            Shape::Simple => write!(f, "simple value"),
            Shape::Decimal => write!(f, "decimal fraction"),
            Shape::Rational => write!(f, "rational number"),
            Shape::Symbol => write!(f, "symbol"),
            Shape::Keyword => write!(f, "keyword"),
            Shape::TaggedLiteral => write!(f, "tagged literal"),
            Shape::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Converts the decoded inner value of a tag into its domain value.
pub type ReadHandler = Box<dyn Fn(u64, Value) -> Result<Value, CodecError> + Send + Sync>;

/// Converts a domain value into `(tag, inner)`; the inner value is re-entered
/// into the encoder. Handlers must only emit inner values of lower
/// registration rank than their input so that re-entry terminates; the
/// built-ins bottom out in byte strings and small integers.
pub type WriteHandler = Box<dyn Fn(&Value) -> Result<(u64, Value), CodecError> + Send + Sync>;

/// Bidirectional tag dispatch table.
///
/// Read handlers are keyed by tag code, write handlers by value [`Shape`].
/// The registry is constructed once, before the codec is used, and is
/// read-only afterwards; it can be shared across threads freely.
///
/// [`TagRegistry::default()`](#impl-Default) carries the built-in handlers
/// for bignums (2/3), decimal fractions (4), tagged literals (27), rationals
/// (30), identifiers (39) and epoch timestamps (1; plus RFC 3339 strings
/// under tag 0 with the `rfc3339` feature). [`empty`](#method.empty) starts
/// from nothing but the unknown-tag/unknown-value hooks.
pub struct TagRegistry {
    readers: BTreeMap<u64, ReadHandler>,
    writers: BTreeMap<Shape, WriteHandler>,
    unknown_tag: ReadHandler,
    unknown_value: WriteHandler,
}

impl Default for TagRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_read(TAG_BIGNUM_POS, Box::new(read_bignum));
        registry.register_read(TAG_BIGNUM_NEG, Box::new(read_bignum));
        registry.register_write(Shape::Int, Box::new(write_bignum));
        registry.register_read(TAG_DECIMAL, Box::new(read_decimal));
        registry.register_write(Shape::Decimal, Box::new(write_decimal));
        registry.register_read(TAG_TAGGED_LITERAL, Box::new(read_tagged_literal));
        registry.register_write(Shape::TaggedLiteral, Box::new(write_tagged_literal));
        registry.register_read(TAG_RATIONAL, Box::new(read_rational));
        registry.register_write(Shape::Rational, Box::new(write_rational));
        registry.register_read(TAG_IDENTIFIER, Box::new(read_identifier));
        registry.register_write(Shape::Symbol, Box::new(write_identifier));
        registry.register_write(Shape::Keyword, Box::new(write_identifier));
        registry.register_read(TAG_EPOCH, Box::new(read_epoch));
        #[cfg(feature = "rfc3339")]
        registry.register_read(TAG_ISO8601, Box::new(read_iso8601));
        registry.register_write(Shape::Timestamp, Box::new(write_epoch));
        registry
    }
}

impl TagRegistry {
    /// A registry without any handlers, with the default hooks: unknown tags
    /// pass through as `Value::Tagged`, unknown values abort the encoder.
    pub fn empty() -> Self {
        Self {
            readers: BTreeMap::new(),
            writers: BTreeMap::new(),
            unknown_tag: Box::new(|tag, value| Ok(Value::Tagged(tag, Box::new(value)))),
            unknown_value: Box::new(|value| {
                Err(CodecError::new(
                    ErrorKind::UnknownValue,
                    format!("no write handler registered for {}", Shape::of(value)),
                ))
            }),
        }
    }

    /// Register both directions of a tag.
    pub fn register(&mut self, tag: u64, shape: Shape, read: ReadHandler, write: WriteHandler) {
        self.register_read(tag, read);
        self.register_write(shape, write);
    }

    pub fn register_read(&mut self, tag: u64, read: ReadHandler) {
        self.readers.insert(tag, read);
    }

    pub fn register_write(&mut self, shape: Shape, write: WriteHandler) {
        self.writers.insert(shape, write);
    }

    /// Replace the hook consulted for tags without a read handler.
    pub fn set_unknown_tag(&mut self, hook: ReadHandler) {
        self.unknown_tag = hook;
    }

    /// Replace the hook consulted for values without a write handler.
    pub fn set_unknown_value(&mut self, hook: WriteHandler) {
        self.unknown_value = hook;
    }

    pub(crate) fn reader(&self, tag: u64) -> Option<&ReadHandler> {
        self.readers.get(&tag)
    }

    pub(crate) fn writer(&self, shape: Shape) -> Option<&WriteHandler> {
        self.writers.get(&shape)
    }

    pub(crate) fn read_unknown(&self, tag: u64, value: Value) -> Result<Value, CodecError> {
        (self.unknown_tag)(tag, value)
    }

    pub(crate) fn write_unknown(&self, value: &Value) -> Result<(u64, Value), CodecError> {
        (self.unknown_value)(value)
    }
}

fn malformed(tag: u64, expected: &str, found: &Value) -> CodecError {
    CodecError::new(
        ErrorKind::IllegalStream,
        format!("tag {} expects {}, found {}", tag, expected, Shape::of(found)),
    )
}

fn read_bignum(tag: u64, inner: Value) -> Result<Value, CodecError> {
    match inner {
        Value::Bytes(bytes) => {
            let magnitude = BigInt::from_bytes_be(Sign::Plus, &bytes);
            Ok(if tag == TAG_BIGNUM_NEG {
                Value::integer(-BigInt::one() - magnitude)
            } else {
                Value::integer(magnitude)
            })
        }
        v => Err(malformed(tag, "a byte string", &v)),
    }
}

fn write_bignum(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::Int(n) => {
            if n.sign() == Sign::Minus {
                let magnitude = -BigInt::one() - n;
                Ok((
                    TAG_BIGNUM_NEG,
                    Value::Bytes(magnitude.magnitude().to_bytes_be()),
                ))
            } else {
                Ok((TAG_BIGNUM_POS, Value::Bytes(n.magnitude().to_bytes_be())))
            }
        }
        v => Err(malformed(TAG_BIGNUM_POS, "a big integer", v)),
    }
}

fn read_decimal(tag: u64, inner: Value) -> Result<Value, CodecError> {
    let (exp, mant) = match &inner {
        Value::Array(a) if a.len() == 2 => (&a[0], &a[1]),
        _ => return Err(malformed(tag, "a two-element array", &inner)),
    };
    let exponent = match exp {
        Value::Pos(_) | Value::Neg(_) | Value::Int(_) => exp.as_i64().ok_or_else(|| {
            CodecError::new(
                ErrorKind::UnrepresentableInteger,
                format!("tag {} exponent does not fit 64 bits", tag),
            )
        })?,
        v => return Err(malformed(tag, "an integer exponent", v)),
    };
    // the wire exponent is the negated scale
    let scale = exponent.checked_neg().ok_or_else(|| {
        CodecError::new(
            ErrorKind::UnrepresentableInteger,
            format!("tag {} exponent does not fit 64 bits", tag),
        )
    })?;
    let mantissa = mant
        .to_bigint()
        .ok_or_else(|| malformed(tag, "an integer mantissa", mant))?;
    Ok(Value::Decimal(Decimal::new(mantissa, scale)))
}

fn write_decimal(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::Decimal(d) => Ok((
            TAG_DECIMAL,
            Value::Array(vec![
                Value::from(-i128::from(d.scale())),
                Value::integer(d.mantissa().clone()),
            ]),
        )),
        v => Err(malformed(TAG_DECIMAL, "a decimal fraction", v)),
    }
}

fn read_rational(tag: u64, inner: Value) -> Result<Value, CodecError> {
    let (numer, denom) = match &inner {
        Value::Array(a) if a.len() == 2 => (&a[0], &a[1]),
        _ => return Err(malformed(tag, "a two-element array", &inner)),
    };
    let numer = numer
        .to_bigint()
        .ok_or_else(|| malformed(tag, "an integer numerator", numer))?;
    let denom = denom
        .to_bigint()
        .ok_or_else(|| malformed(tag, "an integer denominator", denom))?;
    if denom.is_zero() {
        return Err(CodecError::new(
            ErrorKind::IllegalStream,
            format!("tag {} denominator is zero", tag),
        ));
    }
    Ok(Value::Rational(BigRational::new(numer, denom)))
}

fn write_rational(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::Rational(r) => Ok((
            TAG_RATIONAL,
            Value::Array(vec![
                Value::integer(r.numer().clone()),
                Value::integer(r.denom().clone()),
            ]),
        )),
        v => Err(malformed(TAG_RATIONAL, "a rational number", v)),
    }
}

fn read_tagged_literal(tag: u64, inner: Value) -> Result<Value, CodecError> {
    match inner {
        Value::Array(mut a) if a.len() == 2 => {
            let form = a.pop().unwrap_or(Value::Null);
            match a.pop() {
                Some(Value::Str(name)) => Ok(Value::TaggedLiteral(name, Box::new(form))),
                _ => Err(CodecError::new(
                    ErrorKind::IllegalStream,
                    format!("tag {} expects a text string tag name", tag),
                )),
            }
        }
        v => Err(malformed(tag, "a two-element array", &v)),
    }
}

fn write_tagged_literal(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::TaggedLiteral(name, form) => Ok((
            TAG_TAGGED_LITERAL,
            Value::Array(vec![Value::Str(name.clone()), (**form).clone()]),
        )),
        v => Err(malformed(TAG_TAGGED_LITERAL, "a tagged literal", v)),
    }
}

fn read_identifier(tag: u64, inner: Value) -> Result<Value, CodecError> {
    match inner {
        Value::Str(s) => Ok(match s.strip_prefix(':') {
            Some(name) => Value::Keyword(name.to_owned()),
            None => Value::Symbol(s),
        }),
        v => Err(malformed(tag, "a text string", &v)),
    }
}

fn write_identifier(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::Symbol(s) => Ok((TAG_IDENTIFIER, Value::Str(s.clone()))),
        Value::Keyword(s) => Ok((TAG_IDENTIFIER, Value::Str(format!(":{}", s)))),
        v => Err(malformed(TAG_IDENTIFIER, "a symbol or keyword", v)),
    }
}

fn read_epoch(tag: u64, inner: Value) -> Result<Value, CodecError> {
    Timestamp::from_epoch(&inner)
        .map(Value::Timestamp)
        .ok_or_else(|| malformed(tag, "a numeric epoch offset", &inner))
}

#[cfg(feature = "rfc3339")]
fn read_iso8601(tag: u64, inner: Value) -> Result<Value, CodecError> {
    match inner {
        Value::Str(s) => Timestamp::from_string(&s).map(Value::Timestamp).ok_or_else(|| {
            CodecError::new(
                ErrorKind::IllegalStream,
                format!("tag {} string is not RFC 3339: \"{}\"", tag, s.escape_debug()),
            )
        }),
        v => Err(malformed(tag, "a text string", &v)),
    }
}

fn write_epoch(value: &Value) -> Result<(u64, Value), CodecError> {
    match value {
        Value::Timestamp(t) => Ok((TAG_EPOCH, t.to_epoch())),
        v => Err(malformed(TAG_EPOCH, "a timestamp", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bignum_normalizes_to_narrowest_carrier() {
        // tag 2 holding a value that fits u64 comes back as Pos
        let v = read_bignum(TAG_BIGNUM_POS, Value::Bytes(vec![0x01, 0x00])).unwrap();
        assert_eq!(v, Value::Pos(256));
        let v = read_bignum(TAG_BIGNUM_NEG, Value::Bytes(vec![0x01, 0x00])).unwrap();
        assert_eq!(v, Value::Neg(256));

        let nine = vec![1, 0, 0, 0, 0, 0, 0, 0, 0];
        let v = read_bignum(TAG_BIGNUM_POS, Value::Bytes(nine.clone())).unwrap();
        assert_eq!(v, Value::Int(BigInt::from(u64::MAX) + 1u8));
        let (tag, inner) = write_bignum(&v).unwrap();
        assert_eq!((tag, inner), (TAG_BIGNUM_POS, Value::Bytes(nine.clone())));

        let v = read_bignum(TAG_BIGNUM_NEG, Value::Bytes(nine.clone())).unwrap();
        assert_eq!(v, Value::Int(-BigInt::from(u64::MAX) - 2u8));
        let (tag, inner) = write_bignum(&v).unwrap();
        assert_eq!((tag, inner), (TAG_BIGNUM_NEG, Value::Bytes(nine)));
    }

    #[test]
    fn decimal_negates_the_scale() {
        let v = read_decimal(
            TAG_DECIMAL,
            Value::Array(vec![Value::Neg(1), Value::Pos(27315)]),
        )
        .unwrap();
        assert_eq!(v, Value::Decimal(Decimal::new(27315, 2)));

        let (tag, inner) = write_decimal(&v).unwrap();
        assert_eq!(tag, TAG_DECIMAL);
        assert_eq!(inner, Value::Array(vec![Value::Neg(1), Value::Pos(27315)]));
    }

    #[test]
    fn rational_rejects_zero_denominator() {
        let err = read_rational(
            TAG_RATIONAL,
            Value::Array(vec![Value::Pos(1), Value::Pos(0)]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStream);
    }

    #[test]
    fn identifier_splits_on_leading_colon() {
        let v = read_identifier(TAG_IDENTIFIER, Value::Str(":foo/bar".to_owned())).unwrap();
        assert_eq!(v, Value::Keyword("foo/bar".to_owned()));
        let v = read_identifier(TAG_IDENTIFIER, Value::Str("foo".to_owned())).unwrap();
        assert_eq!(v, Value::Symbol("foo".to_owned()));

        let (_, inner) = write_identifier(&Value::Keyword("foo/bar".to_owned())).unwrap();
        assert_eq!(inner, Value::Str(":foo/bar".to_owned()));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(read_bignum(TAG_BIGNUM_POS, Value::Pos(1)).is_err());
        assert!(read_decimal(TAG_DECIMAL, Value::Array(vec![Value::Pos(1)])).is_err());
        assert!(read_tagged_literal(TAG_TAGGED_LITERAL, Value::Null).is_err());
        let err = read_decimal(
            TAG_DECIMAL,
            Value::Array(vec![Value::Float(1.0), Value::Pos(1)]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStream);
    }
}
