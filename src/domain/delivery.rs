//! Per-target delivery accounting for fan-out sends.
//!
//! A send targeting N registrations produces one [`TargetDelivery`] per
//! target. Delivery is not atomic across targets: connections that
//! succeeded have already received the payload even when a sibling send
//! fails, so the report exposes per-target results rather than a single
//! collapsed error.

use super::connection::SendError;
use super::registration::RegistrationId;

/// Outcome of one per-connection send within a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDelivery {
    /// The targeted registration.
    pub registration: RegistrationId,
    /// Result of the individual transport write.
    pub result: Result<(), SendError>,
}

/// Aggregate outcome of a `send` or `send_all` fan-out.
///
/// An empty report (zero targets) is trivially complete: sending to an
/// owner/key with no registered connections is a no-op, not an error.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    results: Vec<TargetDelivery>,
}

impl DeliveryReport {
    /// Builds a report from per-target results.
    #[must_use]
    pub fn from_results(results: Vec<TargetDelivery>) -> Self {
        Self { results }
    }

    /// Number of registrations targeted by the snapshot.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Number of targets whose write completed successfully.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|t| t.result.is_ok()).count()
    }

    /// Returns `true` when every targeted write succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|t| t.result.is_ok())
    }

    /// First failure observed, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&SendError> {
        self.results
            .iter()
            .find_map(|t| t.result.as_ref().err())
    }

    /// Per-target results, in snapshot order.
    #[must_use]
    pub fn results(&self) -> &[TargetDelivery] {
        &self.results
    }

    /// Folds another report into this one (used by broadcast to merge
    /// per-owner outcomes).
    pub fn merge(&mut self, other: Self) {
        self.results.extend(other.results);
    }
}
