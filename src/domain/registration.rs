//! Registration entries: one live connection bound to an (owner, key) bucket.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::connection::{ConnectionHandle, Payload};

/// Callback invoked with each inbound payload received on a connection.
///
/// Invoked synchronously by [`super::ConnectionRegistry::dispatch_inbound`],
/// outside all registry locks. Errors or panics raised by the handler are
/// not caught by the registry.
pub type InboundHandler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Stable identifier for one registration, used for idempotent removal.
///
/// Wraps a UUID v4 generated at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(uuid::Uuid);

impl RegistrationId {
    /// Creates a new random `RegistrationId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live connection registered under an (owner, key) bucket.
///
/// Belongs to exactly one bucket for its entire life; removed at most
/// once, never reinserted. A fresh connection requires a fresh
/// registration.
pub struct Registration {
    /// Stable removal identifier.
    pub id: RegistrationId,
    /// Sending reference to the connection.
    pub handle: ConnectionHandle,
    /// Optional inbound handler; absent means inbound data is discarded.
    pub on_data: Option<InboundHandler>,
}

impl Registration {
    /// Creates a registration with a fresh [`RegistrationId`].
    #[must_use]
    pub fn new(handle: ConnectionHandle, on_data: Option<InboundHandler>) -> Self {
        Self {
            id: RegistrationId::new(),
            handle,
            on_data,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("on_data", &self.on_data.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(RegistrationId::new(), RegistrationId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let id = RegistrationId::new();
        let s = format!("{id}");
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn new_registration_gets_fresh_id() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        let a = Registration::new(handle.clone(), None);
        let b = Registration::new(handle, None);
        assert_ne!(a.id, b.id);
    }
}
