use crate::domain::driver::DriverId;
use crate::domain::passenger::PassengerId;
use crate::domain::ride::{RideId, RideStatus};
use crate::error::{Result, RideError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    RegisterDriver,
    SetDriverStatus,
    RegisterPassenger,
    UpdatePassenger,
    DeletePassenger,
    RequestRide,
    UpdateStatus,
    Reconcile,
}

/// One CSV row. Which columns are required depends on `command`; `id` names a
/// driver, passenger or ride accordingly.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub command: CommandKind,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub status: Option<RideStatus>,
    #[serde(default)]
    pub available: Option<bool>,
}

/// A validated batch command.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    RegisterDriver {
        name: String,
    },
    SetDriverStatus {
        driver: DriverId,
        available: bool,
    },
    RegisterPassenger {
        name: String,
    },
    UpdatePassenger {
        passenger: PassengerId,
        name: String,
    },
    DeletePassenger {
        passenger: PassengerId,
    },
    RequestRide {
        passenger: PassengerId,
        origin: String,
        destination: String,
    },
    UpdateStatus {
        ride: RideId,
        status: RideStatus,
    },
    Reconcile,
}

fn required<T>(value: Option<T>, column: &str, command: CommandKind) -> Result<T> {
    value.ok_or_else(|| {
        RideError::ValidationError(format!("{command:?} requires the `{column}` column"))
    })
}

impl TryFrom<CommandRecord> for Command {
    type Error = RideError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.command;
        let command = match kind {
            CommandKind::RegisterDriver => Command::RegisterDriver {
                name: required(record.name, "name", kind)?,
            },
            CommandKind::SetDriverStatus => Command::SetDriverStatus {
                driver: DriverId(required(record.id, "id", kind)?),
                available: required(record.available, "available", kind)?,
            },
            CommandKind::RegisterPassenger => Command::RegisterPassenger {
                name: required(record.name, "name", kind)?,
            },
            CommandKind::UpdatePassenger => Command::UpdatePassenger {
                passenger: PassengerId(required(record.id, "id", kind)?),
                name: required(record.name, "name", kind)?,
            },
            CommandKind::DeletePassenger => Command::DeletePassenger {
                passenger: PassengerId(required(record.id, "id", kind)?),
            },
            CommandKind::RequestRide => Command::RequestRide {
                passenger: PassengerId(required(record.id, "id", kind)?),
                origin: required(record.origin, "origin", kind)?,
                destination: required(record.destination, "destination", kind)?,
            },
            CommandKind::UpdateStatus => Command::UpdateStatus {
                ride: RideId(required(record.id, "id", kind)?),
                status: required(record.status, "status", kind)?,
            },
            CommandKind::Reconcile => Command::Reconcile,
        };
        Ok(command)
    }
}

/// Reads batch commands from a CSV source.
///
/// Wraps `csv::Reader`, trims whitespace and tolerates short rows, so a
/// command only needs the columns it uses.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(RideError::from).and_then(Command::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "command, id, name, origin, destination, status, available\n";

    fn read(body: &str) -> Vec<Result<Command>> {
        let data = format!("{HEADER}{body}");
        CommandReader::new(data.as_bytes()).commands().collect()
    }

    #[test]
    fn test_reader_valid_stream() {
        let results = read(
            "register_passenger, , Jerry, , , ,\n\
             register_driver, , Rick, , , ,\n\
             request_ride, 1, , Downtown, Airport, ,\n\
             update_status, 1, , , , IN_PROGRESS,\n\
             set_driver_status, 1, , , , , false\n\
             reconcile\n",
        );
        let commands: Vec<Command> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            commands,
            vec![
                Command::RegisterPassenger {
                    name: "Jerry".to_string()
                },
                Command::RegisterDriver {
                    name: "Rick".to_string()
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
                Command::SetDriverStatus {
                    driver: DriverId(1),
                    available: false,
                },
                Command::Reconcile,
            ]
        );
    }

    #[test]
    fn test_reader_malformed_line() {
        let results = read("teleport, 1, , , , ,\nregister_driver, , Rick, , , ,\n");
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_reader_missing_column() {
        let results = read("update_status, 1, , , , ,\n");
        assert!(matches!(results[0], Err(RideError::ValidationError(_))));
    }

    #[test]
    fn test_reader_unknown_status() {
        let results = read("update_status, 1, , , , FLYING,\n");
        assert!(matches!(results[0], Err(RideError::CsvError(_))));
    }
}
