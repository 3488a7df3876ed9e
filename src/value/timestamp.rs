use crate::value::Value;

/// Representation of a point in time (tags 0 and 1).
///
/// Decoded from a numeric epoch offset (tag 1) or, with the `rfc3339`
/// feature, from an RFC 3339 text string (tag 0). Always re-encoded as
/// tag 1, so the timezone offset and textual precision of a tag 0 input do
/// not survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    unix_epoch: i64,
    nanos: u32,
    tz_sec_east: i32,
}

impl Timestamp {
    pub fn new(unix_epoch: i64, nanos: u32, tz_sec_east: i32) -> Self {
        Self {
            unix_epoch,
            nanos,
            tz_sec_east,
        }
    }

    pub(crate) fn from_epoch(value: &Value) -> Option<Self> {
        match value {
            Value::Pos(t) => Some(Timestamp {
                unix_epoch: i64::try_from(*t).ok()?,
                nanos: 0,
                tz_sec_east: 0,
            }),
            Value::Neg(t) => Some(Timestamp {
                unix_epoch: (-1i64).checked_sub(i64::try_from(*t).ok()?)?,
                nanos: 0,
                tz_sec_east: 0,
            }),
            Value::Float(t) if t.is_finite() => {
                let seconds = t.floor();
                if seconds < i64::MIN as f64 || seconds > i64::MAX as f64 {
                    return None;
                }
                let nanos = ((t - seconds) * 1e9).round() as u32;
                Some(Timestamp {
                    unix_epoch: seconds as i64,
                    nanos: nanos.min(999_999_999),
                    tz_sec_east: 0,
                })
            }
            _ => None,
        }
    }

    #[cfg(feature = "rfc3339")]
    pub(crate) fn from_string(s: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| Timestamp {
                unix_epoch: dt.timestamp(),
                nanos: dt.timestamp_subsec_nanos(),
                tz_sec_east: dt.offset().local_minus_utc(),
            })
            .ok()
    }

    /// The epoch form used for encoding: an integer when there is no
    /// fractional part, a float otherwise.
    pub(crate) fn to_epoch(self) -> Value {
        if self.nanos == 0 {
            Value::from(self.unix_epoch)
        } else {
            Value::Float(self.unix_epoch as f64 + f64::from(self.nanos) * 1e-9)
        }
    }

    /// timestamp value in seconds since the Unix epoch
    pub fn unix_epoch(&self) -> i64 {
        self.unix_epoch
    }

    /// fractional part in nanoseconds, to be added
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// timezone offset in seconds to the east, non-zero only for tag 0 input
    pub fn tz_sec_east(&self) -> i32 {
        self.tz_sec_east
    }
}
