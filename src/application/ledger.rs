use super::LedgerPorts;
use super::dispatch::DispatchCoordinator;
use super::lifecycle::RideLifecycle;
use super::reconcile::{ReconciliationReport, Reconciler};
use super::retry::with_timeout;
use crate::config::LedgerConfig;
use crate::domain::passenger::PassengerId;
use crate::domain::ports::{ReconciliationLogRef, RideStoreRef};
use crate::domain::reconciliation::ReconciliationTask;
use crate::domain::ride::{Ride, RideId, RideStatus};
use crate::error::{EntityKind, Result, RideError};

/// The ride ledger: the entry point for ride requests and status updates.
///
/// Handles requests independently, so it can be shared across tasks
/// (`Arc<RideLedger>`) and driven concurrently. There is no global lock:
/// driver claims are atomic in the registry and status writes are
/// compare-and-set in the ride store.
pub struct RideLedger {
    rides: RideStoreRef,
    reconciliation: ReconciliationLogRef,
    dispatch: DispatchCoordinator,
    lifecycle: RideLifecycle,
    reconciler: Reconciler,
    config: LedgerConfig,
}

impl RideLedger {
    /// Creates a new `RideLedger` over the given collaborators.
    pub fn new(ports: LedgerPorts, config: LedgerConfig) -> Self {
        Self {
            dispatch: DispatchCoordinator::new(&ports, config),
            lifecycle: RideLifecycle::new(&ports, config),
            reconciler: Reconciler::new(&ports, config),
            rides: ports.rides,
            reconciliation: ports.reconciliation,
            config,
        }
    }

    /// Requests a ride; see [`DispatchCoordinator::dispatch`].
    pub async fn create_ride(
        &self,
        passenger_id: PassengerId,
        origin: &str,
        destination: &str,
    ) -> Result<Ride> {
        self.dispatch.dispatch(passenger_id, origin, destination).await
    }

    pub async fn get_ride(&self, id: RideId) -> Result<Ride> {
        with_timeout("get ride", self.config.call_timeout, self.rides.get(id))
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Ride, id))
    }

    /// Rides ordered by creation, optionally only those in `status`.
    pub async fn list_rides(&self, status: Option<RideStatus>) -> Result<Vec<Ride>> {
        with_timeout("list rides", self.config.call_timeout, self.rides.list(status)).await
    }

    /// Moves a ride to `status`; see [`RideLifecycle::update_status`].
    pub async fn update_ride_status(&self, id: RideId, status: RideStatus) -> Result<Ride> {
        self.lifecycle.update_status(id, status).await
    }

    /// Replays pending reconciliation tasks once.
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        self.reconciler.run().await
    }

    pub async fn reconciliation_tasks(&self) -> Result<Vec<ReconciliationTask>> {
        with_timeout(
            "list reconciliation tasks",
            self.config.call_timeout,
            self.reconciliation.all(),
        )
        .await
    }
}
