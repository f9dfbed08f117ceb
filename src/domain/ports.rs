//! Ports the application drives.
//!
//! The registry (drivers, passengers) and the ledger (rides, reconciliation)
//! are separate stores with no shared transaction. Every call may block or
//! fail independently; callers wrap each one in a timeout.

use super::PersonName;
use super::driver::{Driver, DriverId, ReleaseOutcome};
use super::passenger::{Passenger, PassengerId};
use super::pricing::Fare;
use super::reconciliation::{ReconciliationTask, TaskDraft, TaskId};
use super::ride::{PaymentStatus, Ride, RideDraft, RideId, RideStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Driver records and their availability flag.
///
/// `claim` and `release` are the only paths the core uses to mutate
/// availability; both must be atomic on the store.
#[async_trait]
pub trait DriverRegistry: Send + Sync {
    async fn register(&self, name: PersonName) -> Result<Driver>;
    /// Drivers ordered by creation, optionally filtered on availability.
    async fn list(&self, available: Option<bool>) -> Result<Vec<Driver>>;
    async fn get(&self, id: DriverId) -> Result<Option<Driver>>;
    /// Direct availability override. Returns `None` for unknown drivers.
    async fn set_availability(&self, id: DriverId, available: bool) -> Result<Option<Driver>>;
    /// Atomically selects the available driver with the lowest identity and
    /// marks it unavailable. `None` when no driver is available.
    async fn claim(&self) -> Result<Option<DriverId>>;
    /// Atomically marks a driver available. Fails with `NotFound` for unknown
    /// drivers; releasing an available driver succeeds.
    async fn release(&self, id: DriverId) -> Result<ReleaseOutcome>;
}

#[async_trait]
pub trait PassengerRegistry: Send + Sync {
    async fn create(&self, name: PersonName) -> Result<Passenger>;
    async fn list(&self) -> Result<Vec<Passenger>>;
    async fn get(&self, id: PassengerId) -> Result<Option<Passenger>>;
    async fn update(&self, id: PassengerId, name: PersonName) -> Result<Option<Passenger>>;
    /// Returns false if the passenger did not exist.
    async fn delete(&self, id: PassengerId) -> Result<bool>;
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusWrite {
    Applied(Ride),
    /// The ride was no longer in the expected status.
    Conflict(RideStatus),
    Missing,
}

#[async_trait]
pub trait RideStore: Send + Sync {
    async fn insert(&self, draft: RideDraft) -> Result<Ride>;
    async fn get(&self, id: RideId) -> Result<Option<Ride>>;
    /// Rides ordered by creation, optionally filtered on status.
    async fn list(&self, status: Option<RideStatus>) -> Result<Vec<Ride>>;
    /// Compare-and-set on the ride status: writes `to` only if the ride is
    /// currently `from`.
    async fn transition(&self, id: RideId, from: RideStatus, to: RideStatus)
    -> Result<StatusWrite>;
    async fn set_payment_status(&self, id: RideId, status: PaymentStatus)
    -> Result<Option<Ride>>;
}

/// The external payment processor. Every call is idempotent per ride.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, ride: RideId, fare: Fare) -> Result<()>;
    async fn refund(&self, ride: RideId, fare: Fare) -> Result<()>;
    async fn void(&self, ride: RideId) -> Result<()>;
}

#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    async fn record(&self, draft: TaskDraft) -> Result<ReconciliationTask>;
    /// All tasks ordered by creation.
    async fn all(&self) -> Result<Vec<ReconciliationTask>>;
    async fn pending(&self) -> Result<Vec<ReconciliationTask>>;
    async fn resolve(&self, id: TaskId) -> Result<Option<ReconciliationTask>>;
}

pub type DriverRegistryRef = Arc<dyn DriverRegistry>;
pub type PassengerRegistryRef = Arc<dyn PassengerRegistry>;
pub type RideStoreRef = Arc<dyn RideStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type ReconciliationLogRef = Arc<dyn ReconciliationLog>;
