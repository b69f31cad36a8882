//! Validated owner and channel identifiers.
//!
//! [`OwnerId`] and [`ChannelKey`] are newtype wrappers around `String`
//! that reject empty values at construction time, so an invalid
//! identifier can never reach the connection index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Opaque identity of a connection owner.
///
/// Supplied by clients at connect time (e.g. the `owner` query parameter
/// on the WebSocket upgrade) and used as the first-level key of the
/// connection index. Must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner identifier, rejecting empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidIdentifier`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, GatewayError> {
        let value = value.into();
        if value.is_empty() {
            return Err(GatewayError::InvalidIdentifier { what: "owner" });
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

/// Opaque topic/channel key grouping connections for fan-out.
///
/// Second-level key of the connection index. Must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Creates a channel key, rejecting empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidIdentifier`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, GatewayError> {
        let value = value.into();
        if value.is_empty() {
            return Err(GatewayError::InvalidIdentifier { what: "key" });
        }
        Ok(Self(value))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelKey {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelKey {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelKey> for String {
    fn from(key: ChannelKey) -> Self {
        key.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn owner_rejects_empty() {
        assert!(OwnerId::new("").is_err());
    }

    #[test]
    fn key_rejects_empty() {
        assert!(ChannelKey::new("").is_err());
    }

    #[test]
    fn owner_round_trips_through_display() {
        let Ok(owner) = OwnerId::new("alice") else {
            panic!("valid owner");
        };
        assert_eq!(owner.to_string(), "alice");
        assert_eq!(owner.as_str(), "alice");
    }

    #[test]
    fn serde_rejects_empty_owner() {
        let result: Result<OwnerId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn serde_round_trip() {
        let Ok(key) = ChannelKey::new("messaging") else {
            panic!("valid key");
        };
        let Ok(json) = serde_json::to_string(&key) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"messaging\"");
        let Ok(back) = serde_json::from_str::<ChannelKey>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, key);
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let Ok(owner) = OwnerId::new("a") else {
            panic!("valid owner");
        };
        let mut map = HashMap::new();
        map.insert(owner.clone(), 1);
        assert_eq!(map.get(&owner), Some(&1));
    }
}
