use num_bigint::{BigInt, Sign};
use std::fmt::Display;

/// An arbitrary-precision base-10 number.
///
/// The represented value is `mantissa * 10.pow(-scale)`: a positive scale
/// shifts the decimal point to the left, a negative one appends zeros. On the
/// wire this is tag 4 with the *negated* scale as exponent, so 273.15 is
/// carried as mantissa 27315, scale 2 and encoded as `4([-2, 27315])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: BigInt,
    scale: i64,
}

impl Decimal {
    pub fn new(mantissa: impl Into<BigInt>, scale: i64) -> Self {
        Self {
            mantissa: mantissa.into(),
            scale,
        }
    }

    /// The unscaled value.
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    /// Number of decimal digits to the right of the point (may be negative).
    pub fn scale(&self) -> i64 {
        self.scale
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.mantissa.sign() == Sign::Minus {
            f.write_str("-")?;
        }
        let digits = self.mantissa.magnitude().to_string();
        if self.scale <= 0 {
            f.write_str(&digits)?;
            for _ in 0..-self.scale {
                f.write_str("0")?;
            }
            Ok(())
        } else {
            let scale = usize::try_from(self.scale).map_err(|_| std::fmt::Error)?;
            if digits.len() > scale {
                let (int, frac) = digits.split_at(digits.len() - scale);
                write!(f, "{}.{}", int, frac)
            } else {
                write!(f, "0.{:0>width$}", digits, width = scale)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(mantissa: i64, scale: i64) -> String {
        Decimal::new(mantissa, scale).to_string()
    }

    #[test]
    fn display() {
        assert_eq!(d(27315, 2), "273.15");
        assert_eq!(d(-27315, 2), "-273.15");
        assert_eq!(d(5, 0), "5");
        assert_eq!(d(5, -3), "5000");
        assert_eq!(d(5, 3), "0.005");
        assert_eq!(d(-5, 1), "-0.5");
        assert_eq!(d(0, 2), "0.00");
    }
}
