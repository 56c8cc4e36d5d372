//! Wire-level data model: feeds, parameters, attributes and the device
//! identity pair. See §3 of the design for the invariants these types carry.

use crate::limits;

/// Immutable `{device_key, device_password}` pair. Bounded by
/// [`limits::DEVICE_KEY_SIZE`] / [`limits::DEVICE_PASSWORD_SIZE`]; created at
/// initialization and never mutated for the lifetime of a connector.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    key: String,
    password: String,
}

impl DeviceIdentity {
    pub fn new(key: impl Into<String>, password: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        let password = password.into();
        if key.len() > limits::DEVICE_KEY_SIZE {
            return Err(crate::ConnectorError::DeviceKeyTooLong {
                max: limits::DEVICE_KEY_SIZE,
            });
        }
        if password.len() > limits::DEVICE_PASSWORD_SIZE {
            return Err(crate::ConnectorError::DevicePasswordTooLong {
                max: limits::DEVICE_PASSWORD_SIZE,
            });
        }
        Ok(Self { key, password })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// The kind of a [`Feed`]'s values, per §3. Drives both the JSON quoting rule
/// (numeric values unquoted, everything else quoted) and the vector-join
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    Numeric,
    String,
    Boolean,
    Vector,
}

impl FeedType {
    /// Numeric values are emitted unquoted in JSON; everything else is quoted.
    pub fn is_quoted(self) -> bool {
        !matches!(self, FeedType::Numeric)
    }

    /// Wire representation used in `feed_registration`'s `feedType` field.
    pub fn as_str(self) -> &'static str {
        match self {
            FeedType::Numeric => "NUMERIC",
            FeedType::String => "STRING",
            FeedType::Boolean => "BOOLEAN",
            FeedType::Vector => "VECTOR",
        }
    }
}

/// A named, time-stamped measurement. `data` holds one value string for
/// scalar types and N values for `VECTOR`, joined with `,` on the wire.
#[derive(Debug, Clone)]
pub struct Feed {
    pub reference: String,
    pub data: Vec<String>,
    pub utc_ms: i64,
    pub feed_type: FeedType,
}

impl Feed {
    pub fn new(reference: impl Into<String>, value: impl Into<String>, feed_type: FeedType) -> Self {
        Self {
            reference: reference.into(),
            data: vec![value.into()],
            utc_ms: 0,
            feed_type,
        }
    }

    pub fn vector(reference: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            reference: reference.into(),
            data: values,
            utc_ms: 0,
            feed_type: FeedType::Vector,
        }
    }

    pub fn with_timestamp(mut self, utc_ms: i64) -> Self {
        self.utc_ms = utc_ms;
        self
    }

    /// A nonzero timestamp must be millisecond-precision Unix time, i.e.
    /// `>= 10^12`. Implementers are expected to check this before emitting.
    pub fn has_plausible_timestamp(&self) -> bool {
        self.utc_ms == 0 || self.utc_ms >= 1_000_000_000_000
    }

    /// Joined representation of `data`, comma-separated (used verbatim for
    /// scalar feeds and as the VECTOR join rule for multi-value feeds).
    pub fn joined_data(&self) -> String {
        self.data.join(",")
    }
}

/// A named configuration knob, read-write from both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named, read-only device descriptor. Re-registering with the same name
/// updates the value in place (see SPEC_FULL.md supplemental feature #2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            value: value.into(),
        }
    }
}

/// A feed's registration metadata, per `model/feed.h`'s `feed_registration_t`
/// (`name`, `reference`, `unit`, `feedType`). Distinct from [`Feed`], which
/// carries a value rather than a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRegistration {
    pub name: String,
    pub reference: String,
    pub unit: String,
    pub feed_type: FeedType,
}

impl FeedRegistration {
    pub fn new(name: impl Into<String>, reference: impl Into<String>, unit: impl Into<String>, feed_type: FeedType) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            unit: unit.into(),
            feed_type,
        }
    }
}

/// A file list entry as reported by the host's file management backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListEntry {
    pub name: String,
    pub size: u64,
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_identity_rejects_oversized_key() {
        let long = "k".repeat(limits::DEVICE_KEY_SIZE + 1);
        assert!(DeviceIdentity::new(long, "pw").is_err());
    }

    #[test]
    fn device_identity_accepts_boundary_size() {
        let key = "k".repeat(limits::DEVICE_KEY_SIZE);
        let pw = "p".repeat(limits::DEVICE_PASSWORD_SIZE);
        assert!(DeviceIdentity::new(key, pw).is_ok());
    }

    #[test]
    fn feed_timestamp_plausibility() {
        let f = Feed::new("temp", "21.5", FeedType::Numeric);
        assert!(f.has_plausible_timestamp());
        let f = f.with_timestamp(5);
        assert!(!f.has_plausible_timestamp());
        let f = Feed::new("temp", "21.5", FeedType::Numeric).with_timestamp(1_700_000_000_000);
        assert!(f.has_plausible_timestamp());
    }

    #[test]
    fn vector_feed_joins_with_comma() {
        let f = Feed::vector("accel", vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(f.joined_data(), "1,2,3");
    }
}
