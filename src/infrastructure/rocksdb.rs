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
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, OptimisticTransactionDB,
    Options, Transaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for driver records.
pub const CF_DRIVERS: &str = "drivers";
/// Column Family for passenger records.
pub const CF_PASSENGERS: &str = "passengers";
/// Column Family for ride records.
pub const CF_RIDES: &str = "rides";
/// Column Family for reconciliation tasks.
pub const CF_RECONCILIATION: &str = "reconciliation";
/// Column Family for identity counters.
pub const CF_META: &str = "meta";

const NEXT_DRIVER: &[u8] = b"next_driver";
const NEXT_PASSENGER: &[u8] = b"next_passenger";
const NEXT_RIDE: &[u8] = b"next_ride";
const NEXT_TASK: &[u8] = b"next_task";

/// Commits attempted before a contended write gives up.
const MAX_COMMIT_ATTEMPTS: u32 = 64;

type Txn<'a> = Transaction<'a, OptimisticTransactionDB>;

fn internal(message: String) -> RideError {
    RideError::InternalError(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| internal(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| internal(format!("Deserialization error: {}", e)))
}

/// Shared plumbing for both databases.
///
/// Keys are big-endian identities, so iteration order is creation order.
/// Every read-modify-write runs in an optimistic transaction: the keys it
/// depends on are read with `get_for_update_cf`, and a commit that races a
/// conflicting write fails with `Busy` and is replayed from a fresh read.
#[derive(Clone)]
struct Store {
    db: Arc<OptimisticTransactionDB>,
}

impl Store {
    fn open<P: AsRef<Path>>(path: P, families: &[&str]) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = families
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db: OptimisticTransactionDB =
            OptimisticTransactionDB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            RideError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get<T: DeserializeOwned>(&self, family: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    /// Runs `body` in a fresh transaction and commits it, replaying the whole
    /// body when the commit loses a write conflict.
    fn atomically<T>(&self, mut body: impl FnMut(&Txn<'_>) -> Result<T>) -> Result<T> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let txn = self.db.transaction();
            let value = body(&txn)?;
            match txn.commit() {
                Ok(()) => return Ok(value),
                Err(err) if matches!(err.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    tracing::debug!(attempt, error = %err, "Write conflict, replaying transaction");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RideError::upstream(
            "commit transaction",
            format!("still conflicting after {MAX_COMMIT_ATTEMPTS} attempts"),
        ))
    }

    fn read_for_update<T: DeserializeOwned>(
        &self,
        txn: &Txn<'_>,
        family: &str,
        id: u64,
    ) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match txn.get_for_update_cf(cf, id.to_be_bytes(), true)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, txn: &Txn<'_>, family: &str, id: u64, value: &T) -> Result<()> {
        txn.put_cf(self.cf(family)?, id.to_be_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Reads `id`, applies `change` and writes the result back, atomically.
    /// `Ok(None)` when the record does not exist.
    fn update<T, R>(
        &self,
        family: &str,
        id: u64,
        mut change: impl FnMut(&mut T) -> Result<R>,
    ) -> Result<Option<(T, R)>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.atomically(|txn| {
            let Some(mut value) = self.read_for_update::<T>(txn, family, id)? else {
                return Ok(None);
            };
            let outcome = change(&mut value)?;
            self.write(txn, family, id, &value)?;
            Ok(Some((value, outcome)))
        })
    }

    /// Allocates the next identity from `counter` and writes the record built
    /// for it, committing both together.
    fn insert<T: Serialize>(
        &self,
        family: &str,
        counter: &[u8],
        mut build: impl FnMut(u64) -> T,
    ) -> Result<T> {
        self.atomically(|txn| {
            let meta = self.cf(CF_META)?;
            let current = match txn.get_for_update_cf(meta, counter, true)? {
                Some(bytes) => {
                    let raw: [u8; 8] = bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| internal("Corrupt identity counter".to_string()))?;
                    u64::from_be_bytes(raw)
                }
                None => 0,
            };
            let id = current + 1;
            let value = build(id);
            txn.put_cf(meta, counter, id.to_be_bytes())?;
            self.write(txn, family, id, &value)?;
            Ok(value)
        })
    }
}

/// A persistent driver/passenger registry using RocksDB.
///
/// Thread-safe; `Clone` shares the underlying database handle.
#[derive(Clone)]
pub struct RocksDBRegistry {
    store: Store,
}

impl RocksDBRegistry {
    /// Opens or creates the registry database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            store: Store::open(path, &[CF_DRIVERS, CF_PASSENGERS, CF_META])?,
        })
    }
}

#[async_trait]
impl DriverRegistry for RocksDBRegistry {
    async fn register(&self, name: PersonName) -> Result<Driver> {
        self.store.insert(CF_DRIVERS, NEXT_DRIVER, |id| {
            Driver::new(DriverId(id), name.clone())
        })
    }

    async fn list(&self, available: Option<bool>) -> Result<Vec<Driver>> {
        let drivers: Vec<Driver> = self.store.scan(CF_DRIVERS)?;
        Ok(drivers
            .into_iter()
            .filter(|driver| available.is_none_or(|flag| driver.is_available == flag))
            .collect())
    }

    async fn get(&self, id: DriverId) -> Result<Option<Driver>> {
        self.store.get(CF_DRIVERS, id.value())
    }

    async fn set_availability(&self, id: DriverId, available: bool) -> Result<Option<Driver>> {
        let updated = self
            .store
            .update(CF_DRIVERS, id.value(), |driver: &mut Driver| {
                driver.is_available = available;
                Ok(())
            })?;
        Ok(updated.map(|(driver, ())| driver))
    }

    /// Selects from a plain scan, then flips the first candidate that is
    /// still available under `get_for_update_cf`. A candidate taken in the
    /// meantime moves on to the next one; a lost commit rescans.
    async fn claim(&self) -> Result<Option<DriverId>> {
        self.store.atomically(|txn| {
            let candidates: Vec<Driver> = self.store.scan(CF_DRIVERS)?;
            for candidate in candidates.iter().filter(|driver| driver.is_available) {
                let id = candidate.id.value();
                let Some(mut driver) = self.store.read_for_update::<Driver>(txn, CF_DRIVERS, id)?
                else {
                    continue;
                };
                if driver.claim() {
                    self.store.write(txn, CF_DRIVERS, id, &driver)?;
                    return Ok(Some(driver.id));
                }
            }
            Ok(None)
        })
    }

    async fn release(&self, id: DriverId) -> Result<ReleaseOutcome> {
        self.store
            .update(CF_DRIVERS, id.value(), |driver: &mut Driver| Ok(driver.release()))?
            .map(|(_, outcome)| outcome)
            .ok_or_else(|| RideError::not_found(EntityKind::Driver, id))
    }
}

#[async_trait]
impl PassengerRegistry for RocksDBRegistry {
    async fn create(&self, name: PersonName) -> Result<Passenger> {
        self.store.insert(CF_PASSENGERS, NEXT_PASSENGER, |id| {
            Passenger::new(PassengerId(id), name.clone())
        })
    }

    async fn list(&self) -> Result<Vec<Passenger>> {
        self.store.scan(CF_PASSENGERS)
    }

    async fn get(&self, id: PassengerId) -> Result<Option<Passenger>> {
        self.store.get(CF_PASSENGERS, id.value())
    }

    async fn update(&self, id: PassengerId, name: PersonName) -> Result<Option<Passenger>> {
        let updated = self
            .store
            .update(CF_PASSENGERS, id.value(), |passenger: &mut Passenger| {
                passenger.rename(name.clone());
                Ok(())
            })?;
        Ok(updated.map(|(passenger, ())| passenger))
    }

    async fn delete(&self, id: PassengerId) -> Result<bool> {
        let cf = self.store.cf(CF_PASSENGERS)?;
        self.store.atomically(|txn| {
            if txn.get_for_update_cf(cf, id.value().to_be_bytes(), true)?.is_none() {
                return Ok(false);
            }
            txn.delete_cf(cf, id.value().to_be_bytes())?;
            Ok(true)
        })
    }
}

/// A persistent ride ledger and reconciliation log using RocksDB.
#[derive(Clone)]
pub struct RocksDBLedger {
    store: Store,
}

impl RocksDBLedger {
    /// Opens or creates the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            store: Store::open(path, &[CF_RIDES, CF_RECONCILIATION, CF_META])?,
        })
    }
}

#[async_trait]
impl RideStore for RocksDBLedger {
    async fn insert(&self, draft: RideDraft) -> Result<Ride> {
        self.store
            .insert(CF_RIDES, NEXT_RIDE, |id| draft.clone().into_ride(RideId(id)))
    }

    async fn get(&self, id: RideId) -> Result<Option<Ride>> {
        self.store.get(CF_RIDES, id.value())
    }

    async fn list(&self, status: Option<RideStatus>) -> Result<Vec<Ride>> {
        let rides: Vec<Ride> = self.store.scan(CF_RIDES)?;
        Ok(rides
            .into_iter()
            .filter(|ride| status.is_none_or(|wanted| ride.status == wanted))
            .collect())
    }

    async fn transition(
        &self,
        id: RideId,
        from: RideStatus,
        to: RideStatus,
    ) -> Result<StatusWrite> {
        self.store.atomically(|txn| {
            let Some(mut ride) = self.store.read_for_update::<Ride>(txn, CF_RIDES, id.value())?
            else {
                return Ok(StatusWrite::Missing);
            };
            if ride.status != from {
                return Ok(StatusWrite::Conflict(ride.status));
            }
            ride.advance(to)?;
            self.store.write(txn, CF_RIDES, id.value(), &ride)?;
            Ok(StatusWrite::Applied(ride))
        })
    }

    async fn set_payment_status(&self, id: RideId, status: PaymentStatus) -> Result<Option<Ride>> {
        let updated = self.store.update(CF_RIDES, id.value(), |ride: &mut Ride| {
            ride.record_payment(status);
            Ok(())
        })?;
        Ok(updated.map(|(ride, ())| ride))
    }
}

#[async_trait]
impl ReconciliationLog for RocksDBLedger {
    async fn record(&self, draft: TaskDraft) -> Result<ReconciliationTask> {
        self.store.insert(CF_RECONCILIATION, NEXT_TASK, |id| {
            draft.clone().into_task(TaskId(id))
        })
    }

    async fn all(&self) -> Result<Vec<ReconciliationTask>> {
        self.store.scan(CF_RECONCILIATION)
    }

    async fn pending(&self) -> Result<Vec<ReconciliationTask>> {
        let tasks: Vec<ReconciliationTask> = self.store.scan(CF_RECONCILIATION)?;
        Ok(tasks.into_iter().filter(|task| task.is_pending()).collect())
    }

    async fn resolve(&self, id: TaskId) -> Result<Option<ReconciliationTask>> {
        let updated = self
            .store
            .update(CF_RECONCILIATION, id.value(), |task: &mut ReconciliationTask| {
                task.resolve();
                Ok(())
            })?;
        Ok(updated.map(|(task, ())| task))
    }
}
