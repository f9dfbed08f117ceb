//! Application layer containing the dispatch and ride lifecycle orchestration.
//!
//! `RideLedger` is the entry point for ride requests and status updates. It
//! composes the `DispatchCoordinator` (claim a driver, write the ride,
//! compensate on failure), the `RideLifecycle` state machine (commit the
//! status, then converge payment and driver release) and the `Reconciler`
//! that replays side effects which ran out of retries. `RegistryService` is
//! the driver/passenger surface of the registry.

pub mod dispatch;
pub mod ledger;
pub mod lifecycle;
pub mod reconcile;
pub mod registry;
pub mod retry;

use crate::domain::ports::{
    DriverRegistryRef, PassengerRegistryRef, PaymentGatewayRef, ReconciliationLogRef,
    RideStoreRef,
};

/// Every collaborator the ledger talks to.
#[derive(Clone)]
pub struct LedgerPorts {
    pub drivers: DriverRegistryRef,
    pub passengers: PassengerRegistryRef,
    pub rides: RideStoreRef,
    pub payments: PaymentGatewayRef,
    pub reconciliation: ReconciliationLogRef,
}
