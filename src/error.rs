use crate::domain::driver::DriverId;
use crate::domain::passenger::PassengerId;
use crate::domain::reconciliation::ReconciliationAction;
use crate::domain::ride::{RideId, RideStatus};
use std::fmt;
use thiserror::Error;

/// The kind of record a [`RideError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Driver,
    Passenger,
    Ride,
    ReconciliationTask,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Driver => "driver",
            EntityKind::Passenger => "passenger",
            EntityKind::Ride => "ride",
            EntityKind::ReconciliationTask => "reconciliation task",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RideError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },
    #[error("passenger {0} not found")]
    PassengerNotFound(PassengerId),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("no driver available")]
    NoDriverAvailable,
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RideStatus, to: RideStatus },
    #[error("upstream unavailable during {operation}: {reason}")]
    UpstreamUnavailable {
        operation: &'static str,
        reason: String,
    },
    /// A claimed driver could not be released after the ride write failed.
    #[error("driver {driver_id} is stuck unavailable: {source}")]
    DriverStuck {
        driver_id: DriverId,
        #[source]
        source: Box<RideError>,
    },
    #[error("reconciliation required for ride {ride_id}: {action}")]
    ReconciliationRequired {
        ride_id: RideId,
        action: ReconciliationAction,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl RideError {
    pub fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        RideError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn upstream(operation: &'static str, reason: impl fmt::Display) -> Self {
        RideError::UpstreamUnavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Whether a retry may succeed where this attempt failed.
    ///
    /// Client errors and business outcomes are final; only faults of a
    /// dependency (timeouts, store or transport failures) are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            RideError::UpstreamUnavailable { .. }
            | RideError::IoError(_)
            | RideError::InternalError(_) => true,
            #[cfg(feature = "storage-rocksdb")]
            RideError::StorageError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RideError>;
