use crate::domain::PersonName;
use crate::domain::driver::{Driver, DriverId, ReleaseOutcome};
use crate::domain::passenger::{Passenger, PassengerId};
use crate::domain::ports::{
    DriverRegistry, PassengerRegistry, ReconciliationLog, RideStore, StatusWrite,
};
use crate::domain::reconciliation::{ReconciliationTask, TaskDraft, TaskId};
use crate::domain::ride::{PaymentStatus, Ride, RideDraft, RideId, RideStatus};
use crate::error::{EntityKind, Result, RideError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    next_driver: u64,
    next_passenger: u64,
    drivers: BTreeMap<DriverId, Driver>,
    passengers: BTreeMap<PassengerId, Passenger>,
}

/// A thread-safe in-memory driver/passenger registry.
///
/// Uses `Arc<RwLock<..>>` for shared concurrent access. Claims and releases
/// take the write lock, which makes the select-and-flip a single indivisible
/// step. `BTreeMap` keeps drivers ordered by identity, i.e. by creation.
#[derive(Default, Clone)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    /// Creates a new, empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverRegistry for InMemoryRegistry {
    async fn register(&self, name: PersonName) -> Result<Driver> {
        let mut state = self.state.write().await;
        state.next_driver += 1;
        let driver = Driver::new(DriverId(state.next_driver), name);
        state.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn list(&self, available: Option<bool>) -> Result<Vec<Driver>> {
        let state = self.state.read().await;
        Ok(state
            .drivers
            .values()
            .filter(|driver| available.is_none_or(|flag| driver.is_available == flag))
            .cloned()
            .collect())
    }

    async fn get(&self, id: DriverId) -> Result<Option<Driver>> {
        let state = self.state.read().await;
        Ok(state.drivers.get(&id).cloned())
    }

    async fn set_availability(&self, id: DriverId, available: bool) -> Result<Option<Driver>> {
        let mut state = self.state.write().await;
        Ok(state.drivers.get_mut(&id).map(|driver| {
            driver.is_available = available;
            driver.clone()
        }))
    }

    async fn claim(&self) -> Result<Option<DriverId>> {
        let mut state = self.state.write().await;
        Ok(state
            .drivers
            .values_mut()
            .find(|driver| driver.is_available)
            .map(|driver| {
                driver.claim();
                driver.id
            }))
    }

    async fn release(&self, id: DriverId) -> Result<ReleaseOutcome> {
        let mut state = self.state.write().await;
        state
            .drivers
            .get_mut(&id)
            .map(Driver::release)
            .ok_or_else(|| RideError::not_found(EntityKind::Driver, id))
    }
}

#[async_trait]
impl PassengerRegistry for InMemoryRegistry {
    async fn create(&self, name: PersonName) -> Result<Passenger> {
        let mut state = self.state.write().await;
        state.next_passenger += 1;
        let passenger = Passenger::new(PassengerId(state.next_passenger), name);
        state.passengers.insert(passenger.id, passenger.clone());
        Ok(passenger)
    }

    async fn list(&self) -> Result<Vec<Passenger>> {
        let state = self.state.read().await;
        Ok(state.passengers.values().cloned().collect())
    }

    async fn get(&self, id: PassengerId) -> Result<Option<Passenger>> {
        let state = self.state.read().await;
        Ok(state.passengers.get(&id).cloned())
    }

    async fn update(&self, id: PassengerId, name: PersonName) -> Result<Option<Passenger>> {
        let mut state = self.state.write().await;
        Ok(state.passengers.get_mut(&id).map(|passenger| {
            passenger.rename(name);
            passenger.clone()
        }))
    }

    async fn delete(&self, id: PassengerId) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.passengers.remove(&id).is_some())
    }
}

#[derive(Default)]
struct LedgerState {
    next_ride: u64,
    next_task: u64,
    rides: BTreeMap<RideId, Ride>,
    tasks: BTreeMap<TaskId, ReconciliationTask>,
}

/// A thread-safe in-memory ride ledger and reconciliation log.
///
/// Status transitions are compare-and-set under the write lock, so two
/// concurrent transitions on the same ride cannot both apply.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for InMemoryLedger {
    async fn insert(&self, draft: RideDraft) -> Result<Ride> {
        let mut state = self.state.write().await;
        state.next_ride += 1;
        let ride = draft.into_ride(RideId(state.next_ride));
        state.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn get(&self, id: RideId) -> Result<Option<Ride>> {
        let state = self.state.read().await;
        Ok(state.rides.get(&id).cloned())
    }

    async fn list(&self, status: Option<RideStatus>) -> Result<Vec<Ride>> {
        let state = self.state.read().await;
        Ok(state
            .rides
            .values()
            .filter(|ride| status.is_none_or(|wanted| ride.status == wanted))
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: RideId,
        from: RideStatus,
        to: RideStatus,
    ) -> Result<StatusWrite> {
        let mut state = self.state.write().await;
        let Some(ride) = state.rides.get_mut(&id) else {
            return Ok(StatusWrite::Missing);
        };
        if ride.status != from {
            return Ok(StatusWrite::Conflict(ride.status));
        }
        ride.advance(to)?;
        Ok(StatusWrite::Applied(ride.clone()))
    }

    async fn set_payment_status(&self, id: RideId, status: PaymentStatus) -> Result<Option<Ride>> {
        let mut state = self.state.write().await;
        Ok(state.rides.get_mut(&id).map(|ride| {
            ride.record_payment(status);
            ride.clone()
        }))
    }
}

#[async_trait]
impl ReconciliationLog for InMemoryLedger {
    async fn record(&self, draft: TaskDraft) -> Result<ReconciliationTask> {
        let mut state = self.state.write().await;
        state.next_task += 1;
        let task = draft.into_task(TaskId(state.next_task));
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn all(&self) -> Result<Vec<ReconciliationTask>> {
        let state = self.state.read().await;
        Ok(state.tasks.values().cloned().collect())
    }

    async fn pending(&self) -> Result<Vec<ReconciliationTask>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.is_pending())
            .cloned()
            .collect())
    }

    async fn resolve(&self, id: TaskId) -> Result<Option<ReconciliationTask>> {
        let mut state = self.state.write().await;
        Ok(state.tasks.get_mut(&id).map(|task| {
            task.resolve();
            task.clone()
        }))
    }
}
