//! The `x402Version` field of gate-emitted documents.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Marker for x402 protocol version 1, the only version the gate emits.
///
/// Written as the integer `1`. Reading any other number fails, so a
/// challenge or facilitator envelope of a different version never parses
/// into these types.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

/// Shorthand for constructing documents.
pub const V1: X402Version1 = X402Version1;

impl X402Version1 {
    /// Numeric value on the wire.
    pub const NUMBER: u8 = 1;
}

impl PartialEq<u8> for X402Version1 {
    fn eq(&self, other: &u8) -> bool {
        *other == Self::NUMBER
    }
}

impl From<X402Version1> for u8 {
    fn from(_: X402Version1) -> Self {
        X402Version1::NUMBER
    }
}

impl fmt::Display for X402Version1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::NUMBER)
    }
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::NUMBER)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            Self::NUMBER => Ok(Self),
            other => Err(de::Error::custom(format_args!(
                "unsupported x402Version {other}, expected {}",
                Self::NUMBER
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&V1).unwrap(), "1");
        assert_eq!(V1.to_string(), "1");
    }

    #[test]
    fn test_version_rejects_other_values() {
        assert!(serde_json::from_str::<X402Version1>("2").is_err());
        assert!(serde_json::from_str::<X402Version1>("-1").is_err());
        assert!(serde_json::from_str::<X402Version1>("\"1\"").is_err());
        let ok: X402Version1 = serde_json::from_str("1").unwrap();
        assert_eq!(ok, 1u8);
    }
}
