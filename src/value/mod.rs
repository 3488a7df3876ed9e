use num_traits::{One, ToPrimitive};
use std::fmt::Display;

mod number;
mod timestamp;

pub use num_bigint::BigInt;
pub use num_rational::BigRational;
pub use number::Decimal;
pub use timestamp::Timestamp;

/// Decoded form of a CBOR item.
///
/// Beware of the `Neg` variant, which carries `-1 - x`: together with `Pos`
/// it covers every integer in `[-2^64, 2^64 - 1]` without allocating. `Int`
/// is the arbitrary-precision carrier and holds only integers outside that
/// range; use [`Value::integer`](#method.integer) or the `From` impls and
/// the right variant is picked for you.
///
/// The variants past `Simple` are the extended types carried by registered
/// tags; they are produced and consumed through the
/// [`TagRegistry`](../struct.TagRegistry.html).
#[derive(Debug, Clone)]
pub enum Value {
    Pos(u64),
    Neg(u64),
    Int(BigInt),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Tagged(u64, Box<Value>),
    Bool(bool),
    Null,
    Undefined,
    Simple(u8),
    Decimal(Decimal),
    Rational(BigRational),
    Symbol(String),
    Keyword(String),
    TaggedLiteral(String, Box<Value>),
    Timestamp(Timestamp),
}

use Value::*;

impl Value {
    /// Build an integer value in its narrowest carrier.
    pub fn integer(n: impl Into<BigInt>) -> Self {
        let n = n.into();
        if let Some(x) = n.to_u64() {
            return Pos(x);
        }
        if let Some(x) = (-BigInt::one() - &n).to_u64() {
            return Neg(x);
        }
        Int(n)
    }

    /// Try to interpret this value as a 64bit unsigned integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Pos(x) => Some(*x),
            _ => None,
        }
    }

    /// Try to interpret this value as a 64bit signed integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Pos(x) => i64::try_from(*x).ok(),
            Neg(x) => i64::try_from(*x).ok().map(|x| -1 - x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Pos(x) => Some(*x as f64),
            Neg(x) => Some(-1.0 - (*x as f64)),
            Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The integer held in any of the three integer carriers.
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Pos(x) => Some(BigInt::from(*x)),
            Neg(x) => Some(-BigInt::one() - BigInt::from(*x)),
            Int(n) => Some(n.clone()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self {
            Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Undefined)
    }
}

/// Value equality of the data model: structural except for maps, which
/// compare as key-value multisets (keys are unique per level, and canonical
/// encoding reorders entries).
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Pos(a), Pos(b)) => a == b,
            (Neg(a), Neg(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Dict(a), Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Tagged(t, a), Tagged(u, b)) => t == u && a == b,
            (Bool(a), Bool(b)) => a == b,
            (Null, Null) => true,
            (Undefined, Undefined) => true,
            (Simple(a), Simple(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (Rational(a), Rational(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Keyword(a), Keyword(b)) => a == b,
            (TaggedLiteral(t, a), TaggedLiteral(u, b)) => t == u && a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Pos(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::from(i128::from(n))
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        if n >= 0 {
            match u64::try_from(n) {
                Ok(x) => Pos(x),
                Err(_) => Int(n.into()),
            }
        } else {
            match u64::try_from(-1 - n) {
                Ok(x) => Neg(x),
                Err(_) => Int(n.into()),
            }
        }
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Array(a)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Decimal(d)
    }
}

impl From<BigRational> for Value {
    fn from(r: BigRational) -> Self {
        Rational(r)
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Timestamp(t)
    }
}

fn write_float(f: &mut std::fmt::Formatter<'_>, x: f64) -> std::fmt::Result {
    if x == f64::INFINITY {
        write!(f, "Infinity")
    } else if x == f64::NEG_INFINITY {
        write!(f, "-Infinity")
    } else if x.is_nan() {
        write!(f, "NaN")
    } else {
        let s = if x != 0.0 && (x.abs() < 1e-6 || x.abs() > 1e16) {
            format!("{:e}", x)
        } else {
            format!("{}", x)
        };
        let e = s.find('e').unwrap_or(s.len());
        let (mantissa, exponent) = s.split_at(e);
        f.write_str(mantissa)?;
        if !mantissa.contains('.') {
            f.write_str(".0")?;
        }
        f.write_str(exponent)
    }
}

/// Renders the [diagnostic notation](https://datatracker.ietf.org/doc/html/rfc8949#section-8);
/// extended types appear in their tagged wire shape.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pos(x) => write!(f, "{}", x),
            Neg(x) => write!(f, "{}", -1 - i128::from(*x)),
            Int(n) => write!(f, "{}", n),
            Float(x) => write_float(f, *x),
            Bytes(b) => {
                write!(f, "h'")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
            Str(s) => write!(f, "\"{}\"", s.escape_debug()),
            Array(a) => {
                write!(f, "[")?;
                for (i, item) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Dict(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Tagged(tag, inner) => write!(f, "{}({})", tag, inner),
            Bool(b) => write!(f, "{}", b),
            Null => write!(f, "null"),
            Undefined => write!(f, "undefined"),
            Simple(x) => write!(f, "simple({})", x),
            Decimal(d) => write!(f, "4([{}, {}])", -i128::from(d.scale()), d.mantissa()),
            Rational(r) => write!(f, "30([{}, {}])", r.numer(), r.denom()),
            Symbol(s) => write!(f, "39(\"{}\")", s.escape_debug()),
            Keyword(s) => write!(f, "39(\":{}\")", s.escape_debug()),
            TaggedLiteral(tag, form) => write!(f, "27([\"{}\", {}])", tag.escape_debug(), form),
            Timestamp(t) => write!(f, "1({})", t.to_epoch()),
        }
    }
}
