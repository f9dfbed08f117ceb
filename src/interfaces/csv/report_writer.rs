use crate::domain::driver::Driver;
use crate::domain::passenger::Passenger;
use crate::domain::reconciliation::ReconciliationTask;
use crate::domain::ride::{PaymentStatus, Ride, RideStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct RideRow<'a> {
    id: u64,
    passenger: u64,
    driver: u64,
    origin: &'a str,
    destination: &'a str,
    price: Decimal,
    status: RideStatus,
    payment_status: PaymentStatus,
}

#[derive(Debug, Serialize)]
struct DriverRow<'a> {
    id: u64,
    name: &'a str,
    available: bool,
}

#[derive(Debug, Serialize)]
struct PassengerRow<'a> {
    id: u64,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct TaskRow<'a> {
    id: u64,
    ride: Option<u64>,
    action: String,
    reason: &'a str,
    resolved: bool,
}

/// Writes final state as CSV, one report per writer.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rides(&mut self, rides: &[Ride]) -> Result<()> {
        for ride in rides {
            self.writer.serialize(RideRow {
                id: ride.id.value(),
                passenger: ride.passenger_id.value(),
                driver: ride.driver_id.value(),
                origin: ride.origin.as_str(),
                destination: ride.destination.as_str(),
                price: ride.fare.value(),
                status: ride.status,
                payment_status: ride.payment_status,
            })?;
        }
        self.flush()
    }

    pub fn write_drivers(&mut self, drivers: &[Driver]) -> Result<()> {
        for driver in drivers {
            self.writer.serialize(DriverRow {
                id: driver.id.value(),
                name: driver.name.as_str(),
                available: driver.is_available,
            })?;
        }
        self.flush()
    }

    pub fn write_passengers(&mut self, passengers: &[Passenger]) -> Result<()> {
        for passenger in passengers {
            self.writer.serialize(PassengerRow {
                id: passenger.id.value(),
                name: passenger.name.as_str(),
            })?;
        }
        self.flush()
    }

    pub fn write_tasks(&mut self, tasks: &[ReconciliationTask]) -> Result<()> {
        for task in tasks {
            self.writer.serialize(TaskRow {
                id: task.id.value(),
                ride: task.ride_id.map(|id| id.value()),
                action: task.action.to_string(),
                reason: &task.reason,
                resolved: !task.is_pending(),
            })?;
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PersonName;
    use crate::domain::driver::DriverId;
    use crate::domain::passenger::PassengerId;
    use crate::domain::pricing::Fare;
    use crate::domain::ride::{RideDraft, RideId, Zone};
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_rides() {
        let ride = RideDraft {
            passenger_id: PassengerId(1),
            driver_id: DriverId(2),
            origin: Zone::new("Downtown").unwrap(),
            destination: Zone::new("Airport").unwrap(),
            fare: Fare::new(dec!(17.50)).unwrap(),
        }
        .into_ride(RideId(3));

        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_rides(&[ride]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,passenger,driver,origin,destination,price,status,payment_status\n\
             3,1,2,Downtown,Airport,17.50,ASSIGNED,PENDING\n"
        );
    }

    #[test]
    fn test_write_drivers() {
        let mut driver = Driver::new(DriverId(1), PersonName::new("Rick").unwrap());
        driver.claim();

        let mut out = Vec::new();
        ReportWriter::new(&mut out).write_drivers(&[driver]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,name,available\n1,Rick,false\n");
    }
}
