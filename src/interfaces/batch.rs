use crate::application::ledger::RideLedger;
use crate::application::registry::RegistryService;
use crate::error::Result;
use crate::interfaces::csv::command_reader::Command;
use std::sync::Arc;

/// Applies batch commands to the registry and the ride ledger.
pub struct BatchRunner {
    registry: RegistryService,
    ledger: Arc<RideLedger>,
}

impl BatchRunner {
    pub fn new(registry: RegistryService, ledger: Arc<RideLedger>) -> Self {
        Self { registry, ledger }
    }

    pub fn registry(&self) -> &RegistryService {
        &self.registry
    }

    pub fn ledger(&self) -> &RideLedger {
        &self.ledger
    }

    /// Executes one command. Errors are per command; the caller decides
    /// whether to keep going.
    pub async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::RegisterDriver { name } => {
                self.registry.register_driver(&name).await?;
            }
            Command::SetDriverStatus { driver, available } => {
                self.registry.set_driver_status(driver, available).await?;
            }
            Command::RegisterPassenger { name } => {
                self.registry.register_passenger(&name).await?;
            }
            Command::UpdatePassenger { passenger, name } => {
                self.registry.update_passenger(passenger, &name).await?;
            }
            Command::DeletePassenger { passenger } => {
                self.registry.delete_passenger(passenger).await?;
            }
            Command::RequestRide {
                passenger,
                origin,
                destination,
            } => {
                self.ledger
                    .create_ride(passenger, &origin, &destination)
                    .await?;
            }
            Command::UpdateStatus { ride, status } => {
                self.ledger.update_ride_status(ride, status).await?;
            }
            Command::Reconcile => {
                let report = self.ledger.reconcile().await?;
                tracing::info!(
                    resolved = report.resolved.len(),
                    still_pending = report.still_pending.len(),
                    "Reconciliation pass finished"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::LedgerPorts;
    use crate::config::LedgerConfig;
    use crate::domain::driver::DriverId;
    use crate::domain::passenger::PassengerId;
    use crate::domain::ride::{PaymentStatus, RideId, RideStatus};
    use crate::error::{EntityKind, RideError};
    use crate::infrastructure::in_memory::{InMemoryLedger, InMemoryRegistry};
    use crate::infrastructure::payment::LoggingPaymentGateway;

    fn runner() -> BatchRunner {
        let registry = Arc::new(InMemoryRegistry::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let ports = LedgerPorts {
            drivers: registry.clone(),
            passengers: registry.clone(),
            rides: ledger.clone(),
            payments: Arc::new(LoggingPaymentGateway::new()),
            reconciliation: ledger,
        };
        BatchRunner::new(
            RegistryService::new(registry.clone(), registry),
            Arc::new(RideLedger::new(ports, LedgerConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_batch_full_ride() {
        let runner = runner();
        let commands = vec![
            Command::RegisterPassenger {
                name: "Jerry".to_string(),
            },
            Command::RegisterDriver {
                name: "Rick".to_string(),
            },
            Command::RequestRide {
                passenger: PassengerId(1),
                origin: "Downtown".to_string(),
                destination: "Airport".to_string(),
            },
            Command::UpdateStatus {
                ride: RideId(1),
                status: RideStatus::InProgress,
            },
            Command::UpdateStatus {
                ride: RideId(1),
                status: RideStatus::Completed,
            },
        ];
        for command in commands {
            runner.execute(command).await.unwrap();
        }

        let ride = runner.ledger().get_ride(RideId(1)).await.unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.payment_status, PaymentStatus::Captured);
        assert!(
            runner
                .registry()
                .get_driver(DriverId(1))
                .await
                .unwrap()
                .is_available
        );
    }

    #[tokio::test]
    async fn test_batch_errors_are_per_command() {
        let runner = runner();
        let err = runner
            .execute(Command::UpdatePassenger {
                passenger: PassengerId(3),
                name: "Summer".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RideError::NotFound {
                kind: EntityKind::Passenger,
                id: 3
            }
        ));

        runner
            .execute(Command::RegisterDriver {
                name: "Rick".to_string(),
            })
            .await
            .unwrap();
        runner.execute(Command::Reconcile).await.unwrap();
    }
}
