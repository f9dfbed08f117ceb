use super::driver::DriverId;
use super::entity_id;
use super::passenger::PassengerId;
use super::pricing::Fare;
use crate::error::RideError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

entity_id!(
    /// Identity of a ride in the ledger.
    RideId
);

/// A pickup or drop-off zone. Always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

impl Zone {
    pub fn new(value: impl AsRef<str>) -> Result<Self, RideError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RideError::ValidationError(
                "zone must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Zone {
    type Error = RideError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Checks `self -> next` against the transition table.
    ///
    /// Self-loops are rejected and terminal states accept nothing.
    pub fn transition_to(self, next: RideStatus) -> Result<(), RideError> {
        use RideStatus::*;
        match (self, next) {
            (Assigned, InProgress) | (Assigned, Cancelled) => Ok(()),
            (InProgress, Completed) | (InProgress, Cancelled) => Ok(()),
            (from, to) => Err(RideError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RideStatus::Assigned => "ASSIGNED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Captured,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(label)
    }
}

/// The call a terminal transition owes the payment processor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    Capture,
    Refund,
    Void,
}

impl PaymentAction {
    /// Payment status once the processor has accepted the action.
    pub fn resulting_status(self) -> PaymentStatus {
        match self {
            PaymentAction::Capture => PaymentStatus::Captured,
            PaymentAction::Refund => PaymentStatus::Refunded,
            PaymentAction::Void => PaymentStatus::Pending,
        }
    }

    /// Whether a ride in `status` still owes this action. A capture belongs
    /// to a completed ride; a refund or void to a cancelled one.
    pub fn is_owed_by(self, status: RideStatus) -> bool {
        match self {
            PaymentAction::Capture => status == RideStatus::Completed,
            PaymentAction::Refund | PaymentAction::Void => status == RideStatus::Cancelled,
        }
    }
}

/// Side effects owed after a transition has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalEffects {
    pub payment: Option<PaymentAction>,
    pub release_driver: bool,
}

impl TerminalEffects {
    pub const NONE: Self = Self {
        payment: None,
        release_driver: false,
    };

    /// Effects of moving `from -> to` for a ride whose payment is `payment`.
    ///
    /// Cancelling an assigned ride never touches the processor: nothing was
    /// authorized before pickup.
    pub fn for_transition(from: RideStatus, to: RideStatus, payment: PaymentStatus) -> Self {
        match (from, to) {
            (RideStatus::InProgress, RideStatus::Completed) => Self {
                payment: Some(PaymentAction::Capture),
                release_driver: true,
            },
            (RideStatus::InProgress, RideStatus::Cancelled) => Self {
                payment: Some(match payment {
                    PaymentStatus::Captured => PaymentAction::Refund,
                    PaymentStatus::Pending | PaymentStatus::Refunded => PaymentAction::Void,
                }),
                release_driver: true,
            },
            (RideStatus::Assigned, RideStatus::Cancelled) => Self {
                payment: None,
                release_driver: true,
            },
            _ => Self::NONE,
        }
    }
}

/// Everything the coordinator knows about a ride before the ledger assigns
/// it an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RideDraft {
    pub passenger_id: PassengerId,
    pub driver_id: DriverId,
    pub origin: Zone,
    pub destination: Zone,
    pub fare: Fare,
}

impl RideDraft {
    /// The persisted form: ASSIGNED with payment PENDING.
    pub fn into_ride(self, id: RideId) -> Ride {
        let now = Utc::now();
        Ride {
            id,
            passenger_id: self.passenger_id,
            driver_id: self.driver_id,
            origin: self.origin,
            destination: self.destination,
            fare: self.fare,
            status: RideStatus::Assigned,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A ride record as owned by the ledger.
///
/// `driver_id` and `fare` are fixed at creation. `status` moves only through
/// [`RideStatus::transition_to`]; `payment_status` follows it once the
/// terminal side effects have converged.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Ride {
    pub id: RideId,
    pub passenger_id: PassengerId,
    pub driver_id: DriverId,
    pub origin: Zone,
    pub destination: Zone,
    pub fare: Fare,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Validates and applies a status change.
    pub fn advance(&mut self, next: RideStatus) -> Result<(), RideError> {
        self.status.transition_to(next)?;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_payment(&mut self, payment_status: PaymentStatus) {
        self.payment_status = payment_status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ALL: [RideStatus; 4] = [
        RideStatus::Assigned,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    fn draft() -> RideDraft {
        RideDraft {
            passenger_id: PassengerId(1),
            driver_id: DriverId(1),
            origin: Zone::new("Downtown").unwrap(),
            destination: Zone::new("Airport").unwrap(),
            fare: Fare::new(dec!(20.00)).unwrap(),
        }
    }

    #[test]
    fn test_allowed_transitions() {
        use RideStatus::*;
        assert!(Assigned.transition_to(InProgress).is_ok());
        assert!(Assigned.transition_to(Cancelled).is_ok());
        assert!(InProgress.transition_to(Completed).is_ok());
        assert!(InProgress.transition_to(Cancelled).is_ok());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for from in [RideStatus::Completed, RideStatus::Cancelled] {
            for to in ALL {
                assert!(matches!(
                    from.transition_to(to),
                    Err(RideError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_self_transitions_are_rejected() {
        for status in ALL {
            assert!(matches!(
                status.transition_to(status),
                Err(RideError::InvalidTransition { from, to }) if from == status && to == status
            ));
        }
    }

    #[test]
    fn test_skipping_in_progress_is_rejected() {
        assert!(
            RideStatus::Assigned
                .transition_to(RideStatus::Completed)
                .is_err()
        );
        assert!(
            RideStatus::InProgress
                .transition_to(RideStatus::Assigned)
                .is_err()
        );
    }

    #[test]
    fn test_draft_becomes_assigned_and_pending() {
        let ride = draft().into_ride(RideId(9));
        assert_eq!(ride.id, RideId(9));
        assert_eq!(ride.status, RideStatus::Assigned);
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert!(ride.is_active());
    }

    #[test]
    fn test_advance_leaves_status_on_rejection() {
        let mut ride = draft().into_ride(RideId(1));
        assert!(ride.advance(RideStatus::Completed).is_err());
        assert_eq!(ride.status, RideStatus::Assigned);
        ride.advance(RideStatus::InProgress).unwrap();
        assert_eq!(ride.status, RideStatus::InProgress);
    }

    #[test]
    fn test_terminal_effects() {
        use RideStatus::*;
        assert_eq!(
            TerminalEffects::for_transition(InProgress, Completed, PaymentStatus::Pending),
            TerminalEffects {
                payment: Some(PaymentAction::Capture),
                release_driver: true
            }
        );
        assert_eq!(
            TerminalEffects::for_transition(Assigned, Cancelled, PaymentStatus::Pending),
            TerminalEffects {
                payment: None,
                release_driver: true
            }
        );
        assert_eq!(
            TerminalEffects::for_transition(InProgress, Cancelled, PaymentStatus::Pending).payment,
            Some(PaymentAction::Void)
        );
        assert_eq!(
            TerminalEffects::for_transition(InProgress, Cancelled, PaymentStatus::Captured)
                .payment,
            Some(PaymentAction::Refund)
        );
        assert_eq!(
            TerminalEffects::for_transition(Assigned, InProgress, PaymentStatus::Pending),
            TerminalEffects::NONE
        );
    }

    #[test]
    fn test_payment_owed_only_by_matching_terminal_status() {
        assert!(PaymentAction::Capture.is_owed_by(RideStatus::Completed));
        assert!(!PaymentAction::Capture.is_owed_by(RideStatus::InProgress));
        assert!(PaymentAction::Void.is_owed_by(RideStatus::Cancelled));
        assert!(!PaymentAction::Refund.is_owed_by(RideStatus::Completed));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&RideStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let status: PaymentStatus = serde_json::from_str("\"CAPTURED\"").unwrap();
        assert_eq!(status, PaymentStatus::Captured);
    }
}
