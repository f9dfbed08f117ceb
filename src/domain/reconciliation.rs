use super::driver::DriverId;
use super::entity_id;
use super::ride::{PaymentAction, PaymentStatus, RideId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

entity_id!(
    /// Identity of a recorded reconciliation task.
    TaskId
);

/// A side effect that still has to happen for a ride.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconciliationAction {
    CapturePayment,
    RefundPayment,
    VoidPayment,
    /// The processor accepted the action but the ledger did not record it.
    RecordPaymentStatus { status: PaymentStatus },
    ReleaseDriver { driver_id: DriverId },
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationAction::CapturePayment => f.write_str("capture payment"),
            ReconciliationAction::RefundPayment => f.write_str("refund payment"),
            ReconciliationAction::VoidPayment => f.write_str("void payment"),
            ReconciliationAction::RecordPaymentStatus { status } => {
                write!(f, "record payment status {status}")
            }
            ReconciliationAction::ReleaseDriver { driver_id } => {
                write!(f, "release driver {driver_id}")
            }
        }
    }
}

impl From<PaymentAction> for ReconciliationAction {
    fn from(action: PaymentAction) -> Self {
        match action {
            PaymentAction::Capture => ReconciliationAction::CapturePayment,
            PaymentAction::Refund => ReconciliationAction::RefundPayment,
            PaymentAction::Void => ReconciliationAction::VoidPayment,
        }
    }
}

/// What gets appended to the reconciliation log before the log assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub ride_id: Option<RideId>,
    pub action: ReconciliationAction,
    pub reason: String,
}

impl TaskDraft {
    pub fn into_task(self, id: TaskId) -> ReconciliationTask {
        ReconciliationTask {
            id,
            ride_id: self.ride_id,
            action: self.action,
            reason: self.reason,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// A recorded follow-up for a side effect that exhausted its retries.
///
/// `ride_id` is absent when the side effect belongs to a ride that was never
/// written, e.g. the compensation of a failed dispatch.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ReconciliationTask {
    pub id: TaskId,
    pub ride_id: Option<RideId>,
    pub action: ReconciliationAction,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReconciliationTask {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }

    pub fn resolve(&mut self) {
        if self.resolved_at.is_none() {
            self.resolved_at = Some(Utc::now());
        }
    }
}
