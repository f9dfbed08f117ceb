use crate::domain::PersonName;
use crate::domain::driver::{Driver, DriverId, ReleaseOutcome};
use crate::domain::passenger::{Passenger, PassengerId};
use crate::domain::ports::{DriverRegistryRef, PassengerRegistryRef};
use crate::error::{EntityKind, Result, RideError};

/// The driver/passenger registry surface.
///
/// Validates input, turns missing records into `NotFound` and logs every
/// mutation. Availability is exposed both as the explicit status override
/// used by operators and as the atomic claim/release pair.
#[derive(Clone)]
pub struct RegistryService {
    drivers: DriverRegistryRef,
    passengers: PassengerRegistryRef,
}

impl RegistryService {
    pub fn new(drivers: DriverRegistryRef, passengers: PassengerRegistryRef) -> Self {
        Self {
            drivers,
            passengers,
        }
    }

    pub async fn register_driver(&self, name: &str) -> Result<Driver> {
        let driver = self.drivers.register(PersonName::new(name)?).await?;
        tracing::info!(driver_id = %driver.id, name = %driver.name, "Driver registered");
        Ok(driver)
    }

    pub async fn list_drivers(&self, available: Option<bool>) -> Result<Vec<Driver>> {
        let drivers = self.drivers.list(available).await?;
        tracing::debug!(?available, found = drivers.len(), "Listed drivers");
        Ok(drivers)
    }

    pub async fn get_driver(&self, id: DriverId) -> Result<Driver> {
        self.drivers
            .get(id)
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Driver, id))
    }

    pub async fn set_driver_status(&self, id: DriverId, available: bool) -> Result<Driver> {
        let driver = self
            .drivers
            .set_availability(id, available)
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Driver, id))?;
        tracing::info!(driver_id = %id, available, "Driver availability overridden");
        Ok(driver)
    }

    pub async fn claim_driver(&self) -> Result<DriverId> {
        let id = self
            .drivers
            .claim()
            .await?
            .ok_or(RideError::NoDriverAvailable)?;
        tracing::info!(driver_id = %id, "Driver claimed");
        Ok(id)
    }

    pub async fn release_driver(&self, id: DriverId) -> Result<ReleaseOutcome> {
        let outcome = self.drivers.release(id).await?;
        tracing::info!(driver_id = %id, ?outcome, "Driver released");
        Ok(outcome)
    }

    pub async fn register_passenger(&self, name: &str) -> Result<Passenger> {
        let passenger = self.passengers.create(PersonName::new(name)?).await?;
        tracing::info!(passenger_id = %passenger.id, name = %passenger.name, "Passenger registered");
        Ok(passenger)
    }

    pub async fn list_passengers(&self) -> Result<Vec<Passenger>> {
        self.passengers.list().await
    }

    pub async fn get_passenger(&self, id: PassengerId) -> Result<Passenger> {
        self.passengers
            .get(id)
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Passenger, id))
    }

    pub async fn update_passenger(&self, id: PassengerId, name: &str) -> Result<Passenger> {
        let name = PersonName::new(name)?;
        let passenger = self
            .passengers
            .update(id, name)
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Passenger, id))?;
        tracing::info!(passenger_id = %id, "Passenger updated");
        Ok(passenger)
    }

    pub async fn delete_passenger(&self, id: PassengerId) -> Result<()> {
        if !self.passengers.delete(id).await? {
            return Err(RideError::not_found(EntityKind::Passenger, id));
        }
        tracing::info!(passenger_id = %id, "Passenger deleted");
        Ok(())
    }
}
