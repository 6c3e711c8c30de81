//! The persisted cache record and its expiration model.
//!
//! Wire format for durable backends is the JSON object
//! `{"value": <any serializable>, "expiration": <epoch-ms|false>}`.
//! A record whose expiration is in the past is *stale*, not missing: it is
//! still returned so stale-tolerant policies can serve it.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// The unit persisted by any backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub value: Value,
    #[serde(default)]
    pub expiration: Expiration,
}

impl CacheRecord {
    pub fn new(value: Value, expiration: Expiration) -> Self {
        Self { value, expiration }
    }
}

/// Absolute expiration of a stored record.
///
/// Serializes as the sentinel `false` for `Never` and as an epoch-millisecond
/// number otherwise. A missing field deserializes to `Never`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    /// Absolute epoch-millisecond timestamp.
    At(i64),
}

impl Expiration {
    /// True when the record expired before `now_ms`. `Never` is never past.
    pub fn is_past(self, now_ms: i64) -> bool {
        matches!(self, Expiration::At(at) if at < now_ms)
    }

    /// Milliseconds until expiration, or `None` for `Never` (infinite).
    /// Negative once the expiration has passed.
    pub fn remaining_ms(self, now_ms: i64) -> Option<i64> {
        match self {
            Expiration::Never => None,
            Expiration::At(at) => Some(at - now_ms),
        }
    }
}

impl Serialize for Expiration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expiration::Never => serializer.serialize_bool(false),
            Expiration::At(at) => serializer.serialize_i64(*at),
        }
    }
}

impl<'de> Deserialize<'de> for Expiration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExpirationVisitor;

        impl Visitor<'_> for ExpirationVisitor {
            type Value = Expiration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("`false` or an epoch-millisecond number")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Expiration, E> {
                if v {
                    Err(de::Error::invalid_value(de::Unexpected::Bool(v), &self))
                } else {
                    Ok(Expiration::Never)
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Expiration, E> {
                Ok(Expiration::At(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Expiration, E> {
                Ok(Expiration::At(v as i64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Expiration, E> {
                Ok(Expiration::At(v as i64))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Expiration, E> {
                Ok(Expiration::Never)
            }
        }

        deserializer.deserialize_any(ExpirationVisitor)
    }
}

/// Caller-side expiration input for `set`.
///
/// `In` may be negative, which produces an already-stale record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    /// Relative to the moment of the write.
    In(Duration),
    /// Absolute point in time.
    At(OffsetDateTime),
}

impl Expiry {
    /// Shorthand for `Expiry::In(Duration::seconds(secs))`.
    pub fn seconds(secs: i64) -> Self {
        Expiry::In(Duration::seconds(secs))
    }

    pub(crate) fn resolve(self, now_ms: i64) -> Expiration {
        match self {
            Expiry::Never => Expiration::Never,
            Expiry::In(duration) => Expiration::At(now_ms + duration.whole_milliseconds() as i64),
            Expiry::At(at) => Expiration::At((at.unix_timestamp_nanos() / 1_000_000) as i64),
        }
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Expiry::In(duration)
    }
}

impl From<OffsetDateTime> for Expiry {
    fn from(at: OffsetDateTime) -> Self {
        Expiry::At(at)
    }
}
