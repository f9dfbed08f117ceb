use super::LedgerPorts;
use super::reconcile::record_task;
use super::retry::{retry_with_backoff, with_timeout};
use crate::config::LedgerConfig;
use crate::domain::driver::DriverId;
use crate::domain::passenger::PassengerId;
use crate::domain::ports::{
    DriverRegistryRef, PassengerRegistryRef, ReconciliationLogRef, RideStoreRef,
};
use crate::domain::pricing;
use crate::domain::reconciliation::{ReconciliationAction, TaskDraft};
use crate::domain::ride::{Ride, RideDraft, Zone};
use crate::error::{Result, RideError};

/// Turns a ride request into a durably assigned ride, or fails leaving no
/// driver claimed.
///
/// The registry and the ledger share no transaction, so assignment is a
/// saga: claim a driver, write the ride, and if the write fails release the
/// driver before returning the error.
pub struct DispatchCoordinator {
    drivers: DriverRegistryRef,
    passengers: PassengerRegistryRef,
    rides: RideStoreRef,
    reconciliation: ReconciliationLogRef,
    config: LedgerConfig,
}

impl DispatchCoordinator {
    pub fn new(ports: &LedgerPorts, config: LedgerConfig) -> Self {
        Self {
            drivers: ports.drivers.clone(),
            passengers: ports.passengers.clone(),
            rides: ports.rides.clone(),
            reconciliation: ports.reconciliation.clone(),
            config,
        }
    }

    /// Assigns a driver to a new ride from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// * `ValidationError` for a blank zone, before anything is claimed.
    /// * `PassengerNotFound` if the passenger is unknown.
    /// * `NoDriverAvailable` if every driver is busy.
    /// * `UpstreamUnavailable` for a transient ride write fault, once the
    ///   claimed driver has been released. Other write errors pass through.
    /// * `DriverStuck` if that release could not be delivered either.
    pub async fn dispatch(
        &self,
        passenger_id: PassengerId,
        origin: &str,
        destination: &str,
    ) -> Result<Ride> {
        let origin = Zone::new(origin)?;
        let destination = Zone::new(destination)?;
        let limit = self.config.call_timeout;

        with_timeout("get passenger", limit, self.passengers.get(passenger_id))
            .await?
            .ok_or(RideError::PassengerNotFound(passenger_id))?;

        let driver_id = with_timeout("claim driver", limit, self.drivers.claim())
            .await?
            .ok_or(RideError::NoDriverAvailable)?;
        tracing::info!(%passenger_id, %driver_id, "Driver claimed for ride request");

        let draft = RideDraft {
            passenger_id,
            driver_id,
            fare: pricing::quote(&origin, &destination),
            origin,
            destination,
        };

        match with_timeout("insert ride", limit, self.rides.insert(draft)).await {
            Ok(ride) => {
                tracing::info!(
                    ride_id = %ride.id,
                    %passenger_id,
                    %driver_id,
                    fare = %ride.fare,
                    "Ride assigned"
                );
                Ok(ride)
            }
            Err(cause) => Err(self.compensate(driver_id, cause).await),
        }
    }

    /// Releases a driver whose ride was never written. Returns the error the
    /// caller should surface.
    async fn compensate(&self, driver_id: DriverId, cause: RideError) -> RideError {
        tracing::warn!(%driver_id, error = %cause, "Ride write failed, releasing claimed driver");

        let released = retry_with_backoff(
            "release driver",
            self.config.retry,
            self.config.call_timeout,
            || self.drivers.release(driver_id),
        )
        .await;

        match released {
            Ok(outcome) => {
                tracing::info!(%driver_id, ?outcome, "Claimed driver released");
                match cause {
                    RideError::UpstreamUnavailable { .. } => cause,
                    cause if cause.is_transient() => RideError::upstream("insert ride", cause),
                    cause => cause,
                }
            }
            Err(release_error) => {
                tracing::error!(
                    %driver_id,
                    ride_error = %cause,
                    error = %release_error,
                    "Driver stuck unavailable after failed ride write"
                );
                record_task(
                    &self.reconciliation,
                    self.config.call_timeout,
                    TaskDraft {
                        ride_id: None,
                        action: ReconciliationAction::ReleaseDriver { driver_id },
                        reason: format!("ride write failed ({cause}); release failed ({release_error})"),
                    },
                )
                .await;
                RideError::DriverStuck {
                    driver_id,
                    source: Box::new(release_error),
                }
            }
        }
    }
}
