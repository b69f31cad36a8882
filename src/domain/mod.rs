//! Domain layer: identifiers, connection handles, and the registry.
//!
//! This module contains the core of the gateway: validated owner and
//! channel identifiers, the transport handle abstraction, registration
//! entries, per-target delivery accounting, and the concurrent
//! connection registry that routes directed and broadcast sends.

pub mod connection;
pub mod delivery;
pub mod identity;
pub mod registration;
pub mod registry;

pub use connection::{ConnectionHandle, OutboundFrame, Payload, SendError};
pub use delivery::{DeliveryReport, TargetDelivery};
pub use identity::{ChannelKey, OwnerId};
pub use registration::{InboundHandler, Registration, RegistrationId};
pub use registry::{ConnectionRegistry, RegistryStats};
