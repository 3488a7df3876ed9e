use crate::{
    constants::*,
    error::{CodecError, ErrorKind},
    float::{self, FloatBits},
    registry::Shape,
    value::Value,
    Codec,
};

/// Emit a header with the shortest argument encoding that fits.
pub(crate) fn write_info(bytes: &mut Vec<u8>, major: u8, value: u64) {
    if value < 24 {
        bytes.push(major << 5 | value as u8);
    } else if value < 0x100 {
        bytes.push(major << 5 | 24);
        bytes.push(value as u8);
    } else if value < 0x1_0000 {
        bytes.push(major << 5 | 25);
        bytes.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value < 0x1_0000_0000 {
        bytes.push(major << 5 | 26);
        bytes.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        bytes.push(major << 5 | 27);
        bytes.extend_from_slice(&value.to_be_bytes());
    }
}

fn write_float(bytes: &mut Vec<u8>, value: f64) {
    match float::shortest(value) {
        FloatBits::F16(b) => {
            bytes.push(MAJOR_LIT << 5 | LIT_FLOAT16);
            bytes.extend_from_slice(&b.to_be_bytes());
        }
        FloatBits::F32(b) => {
            bytes.push(MAJOR_LIT << 5 | LIT_FLOAT32);
            bytes.extend_from_slice(&b.to_be_bytes());
        }
        FloatBits::F64(b) => {
            bytes.push(MAJOR_LIT << 5 | LIT_FLOAT64);
            bytes.extend_from_slice(&b.to_be_bytes());
        }
    }
}

/// Per-call encoder state; output is buffered in a byte vector owned by the
/// entry point and flushed to the sink in one write.
pub(crate) struct Encoder<'a> {
    codec: &'a Codec,
}

impl<'a> Encoder<'a> {
    pub fn new(codec: &'a Codec) -> Self {
        Self { codec }
    }

    fn recover(&self, kind: ErrorKind, message: impl Into<String>) -> Result<Value, CodecError> {
        (self.codec.handler)(kind, message.into())
    }

    pub fn encode_value(&self, out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
        // registry dispatch comes before the shape dispatch: a write handler
        // turns the value into (tag, inner) and the inner value re-enters
        // the encoder. Handlers must emit inner values of strictly lower
        // registration rank, which bounds the re-entry depth.
        if let Some(write) = self.codec.registry.writer(Shape::of(value)) {
            return match write(value) {
                Ok((tag, inner)) => {
                    write_info(out, MAJOR_TAG, tag);
                    self.encode_value(out, &inner)
                }
                Err(e) => {
                    let substitute = self.recover(e.kind(), e.message().to_owned())?;
                    self.encode_value(out, &substitute)
                }
            };
        }
        match value {
            Value::Pos(x) => {
                write_info(out, MAJOR_POS, *x);
                Ok(())
            }
            Value::Neg(x) => {
                write_info(out, MAJOR_NEG, *x);
                Ok(())
            }
            Value::Float(f) => {
                write_float(out, *f);
                Ok(())
            }
            Value::Bytes(b) => {
                write_info(out, MAJOR_BYTES, b.len() as u64);
                out.extend_from_slice(b);
                Ok(())
            }
            Value::Str(s) => {
                write_info(out, MAJOR_STR, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
                Ok(())
            }
            Value::Array(items) => {
                write_info(out, MAJOR_ARRAY, items.len() as u64);
                for item in items {
                    self.encode_value(out, item)?;
                }
                Ok(())
            }
            Value::Dict(pairs) => self.encode_dict(out, pairs),
            Value::Tagged(tag, inner) => {
                write_info(out, MAJOR_TAG, *tag);
                self.encode_value(out, inner)
            }
            Value::Bool(b) => {
                let lit = if *b { LIT_TRUE } else { LIT_FALSE };
                write_info(out, MAJOR_LIT, u64::from(lit));
                Ok(())
            }
            Value::Null => {
                write_info(out, MAJOR_LIT, u64::from(LIT_NULL));
                Ok(())
            }
            Value::Undefined => {
                write_info(out, MAJOR_LIT, u64::from(LIT_UNDEFINED));
                Ok(())
            }
            Value::Simple(code) => self.encode_simple(out, *code),
            Value::Int(_) => {
                let substitute = self.recover(
                    ErrorKind::UnrepresentableInteger,
                    format!(
                        "integer {} exceeds 64 bits and no bignum handler is registered",
                        value
                    ),
                )?;
                self.encode_value(out, &substitute)
            }
            _ => self.encode_unknown(out, value),
        }
    }

    fn encode_simple(&self, out: &mut Vec<u8>, code: u8) -> Result<(), CodecError> {
        if (20..=31).contains(&code) {
            let substitute = self.recover(
                ErrorKind::ReservedSimple,
                format!("simple value {} is reserved", code),
            )?;
            self.encode_value(out, &substitute)
        } else {
            write_info(out, MAJOR_LIT, u64::from(code));
            Ok(())
        }
    }

    /// Extended shapes whose write handler has been removed go through the
    /// unknown-value hook, which aborts unless replaced.
    fn encode_unknown(&self, out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
        match self.codec.registry.write_unknown(value) {
            Ok((tag, inner)) => {
                write_info(out, MAJOR_TAG, tag);
                self.encode_value(out, &inner)
            }
            Err(e) => {
                let substitute = self.recover(e.kind(), e.message().to_owned())?;
                self.encode_value(out, &substitute)
            }
        }
    }

    fn encode_dict(&self, out: &mut Vec<u8>, pairs: &[(Value, Value)]) -> Result<(), CodecError> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let mut key = Vec::new();
            self.encode_value(&mut key, k)?;
            let mut value = Vec::new();
            self.encode_value(&mut value, v)?;
            entries.push((key, value));
        }
        // RFC 7049 §3.9: shorter key encodings sort first, ties break
        // bytewise; equal keys keep insertion order so the first wins
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            let (ka, kb) = (&entries[a].0, &entries[b].0);
            ka.len()
                .cmp(&kb.len())
                .then_with(|| ka.cmp(kb))
                .then(a.cmp(&b))
        });
        let mut dropped = vec![false; entries.len()];
        for w in order.windows(2) {
            if entries[w[0]].0 == entries[w[1]].0 {
                if self.codec.strict_keys {
                    self.recover(
                        ErrorKind::DuplicateMapKey,
                        format!("duplicate map key {}", pairs[w[1]].0),
                    )?;
                }
                dropped[w[1]] = true;
            }
        }
        let count = dropped.iter().filter(|d| !**d).count();
        write_info(out, MAJOR_DICT, count as u64);
        if self.codec.canonical {
            for &i in &order {
                if !dropped[i] {
                    out.extend_from_slice(&entries[i].0);
                    out.extend_from_slice(&entries[i].1);
                }
            }
        } else {
            for (i, (key, value)) in entries.iter().enumerate() {
                if !dropped[i] {
                    out.extend_from_slice(key);
                    out.extend_from_slice(value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_argument_widths() {
        fn info(value: u64) -> Vec<u8> {
            let mut b = Vec::new();
            write_info(&mut b, MAJOR_POS, value);
            b
        }
        assert_eq!(info(0), vec![0x00]);
        assert_eq!(info(23), vec![0x17]);
        assert_eq!(info(24), vec![0x18, 24]);
        assert_eq!(info(255), vec![0x18, 255]);
        assert_eq!(info(256), vec![0x19, 1, 0]);
        assert_eq!(info(65535), vec![0x19, 0xff, 0xff]);
        assert_eq!(info(65536), vec![0x1a, 0, 1, 0, 0]);
        assert_eq!(info(u64::from(u32::MAX)), vec![0x1a, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            info(u64::from(u32::MAX) + 1),
            vec![0x1b, 0, 0, 0, 1, 0, 0, 0, 0]
        );
        assert_eq!(
            info(u64::MAX),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn float_widths() {
        fn enc(value: f64) -> Vec<u8> {
            let mut b = Vec::new();
            write_float(&mut b, value);
            b
        }
        assert_eq!(enc(0.0), vec![0xf9, 0x00, 0x00]);
        assert_eq!(enc(1.5), vec![0xf9, 0x3e, 0x00]);
        assert_eq!(enc(100000.0), vec![0xfa, 0x47, 0xc3, 0x50, 0x00]);
        assert_eq!(
            enc(1.1),
            vec![0xfb, 0x3f, 0xf1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9a]
        );
        assert_eq!(enc(f64::NAN), vec![0xf9, 0x7e, 0x00]);
    }
}
