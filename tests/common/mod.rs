#![allow(dead_code)]

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use ridenow::application::LedgerPorts;
use ridenow::application::ledger::RideLedger;
use ridenow::application::registry::RegistryService;
use ridenow::application::retry::RetryPolicy;
use ridenow::config::LedgerConfig;
use ridenow::domain::PersonName;
use ridenow::domain::driver::{Driver, DriverId, ReleaseOutcome};
use ridenow::domain::ports::{
    DriverRegistry, PaymentGateway, ReconciliationLog, RideStore, StatusWrite,
};
use ridenow::domain::pricing::Fare;
use ridenow::domain::reconciliation::{ReconciliationTask, TaskDraft, TaskId};
use ridenow::domain::ride::{PaymentStatus, Ride, RideDraft, RideId, RideStatus};
use ridenow::error::{Result, RideError};
use ridenow::infrastructure::in_memory::{InMemoryLedger, InMemoryRegistry};
use ridenow::infrastructure::payment::LoggingPaymentGateway;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

pub const ZONES: [&str; 6] = ["Downtown", "Airport", "Uptown", "Harbor", "Midtown", "Stadium"];

/// Writes a command file registering `drivers` drivers and one passenger,
/// then requesting `rides` rides between random zones.
pub fn generate_commands_csv(path: &Path, drivers: usize, rides: usize) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();

    wtr.write_record(["command", "id", "name", "origin", "destination", "status", "available"])?;
    wtr.write_record(["register_passenger", "", "Jerry", "", "", "", ""])?;
    for i in 1..=drivers {
        wtr.write_record(["register_driver", "", &format!("Driver {i}"), "", "", "", ""])?;
    }
    for _ in 0..rides {
        let origin = ZONES.choose(&mut rng).copied().unwrap_or("Downtown");
        let destination = ZONES[rng.gen_range(0..ZONES.len())];
        wtr.write_record(["request_ride", "1", "", origin, destination, "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}

fn outage(operation: &'static str) -> RideError {
    RideError::upstream(operation, "injected outage")
}

/// Driver registry whose `release` can be switched off.
pub struct FaultyRegistry {
    pub inner: InMemoryRegistry,
    pub fail_release: AtomicBool,
    pub release_calls: AtomicU32,
}

impl FaultyRegistry {
    pub fn new(inner: InMemoryRegistry) -> Self {
        Self {
            inner,
            fail_release: AtomicBool::new(false),
            release_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DriverRegistry for FaultyRegistry {
    async fn register(&self, name: PersonName) -> Result<Driver> {
        DriverRegistry::register(&self.inner, name).await
    }

    async fn list(&self, available: Option<bool>) -> Result<Vec<Driver>> {
        DriverRegistry::list(&self.inner, available).await
    }

    async fn get(&self, id: DriverId) -> Result<Option<Driver>> {
        DriverRegistry::get(&self.inner, id).await
    }

    async fn set_availability(&self, id: DriverId, available: bool) -> Result<Option<Driver>> {
        self.inner.set_availability(id, available).await
    }

    async fn claim(&self) -> Result<Option<DriverId>> {
        self.inner.claim().await
    }

    async fn release(&self, id: DriverId) -> Result<ReleaseOutcome> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(outage("release driver"));
        }
        self.inner.release(id).await
    }
}

/// Ride store whose writes can fail or stall.
pub struct FaultyRideStore {
    pub inner: InMemoryLedger,
    pub fail_insert: AtomicBool,
    /// Fails inserts with a raw internal error instead of an outage.
    pub corrupt_insert: AtomicBool,
    pub fail_payment_status: AtomicBool,
    pub insert_delay: Option<Duration>,
    /// Status writes fail without being applied.
    pub fail_transition: AtomicBool,
    /// Status writes are applied, then the call hangs past any deadline.
    pub stall_transition: AtomicBool,
    /// Reads start failing once a faulty status write happens.
    pub down_after_transition: AtomicBool,
    pub down: AtomicBool,
}

impl FaultyRideStore {
    pub fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            fail_insert: AtomicBool::new(false),
            corrupt_insert: AtomicBool::new(false),
            fail_payment_status: AtomicBool::new(false),
            insert_delay: None,
            fail_transition: AtomicBool::new(false),
            stall_transition: AtomicBool::new(false),
            down_after_transition: AtomicBool::new(false),
            down: AtomicBool::new(false),
        }
    }

    fn drop_off(&self) {
        if self.down_after_transition.load(Ordering::SeqCst) {
            self.down.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RideStore for FaultyRideStore {
    async fn insert(&self, draft: RideDraft) -> Result<Ride> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(outage("insert ride"));
        }
        if self.corrupt_insert.load(Ordering::SeqCst) {
            return Err(RideError::InternalError("disk full".into()));
        }
        self.inner.insert(draft).await
    }

    async fn get(&self, id: RideId) -> Result<Option<Ride>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(outage("get ride"));
        }
        RideStore::get(&self.inner, id).await
    }

    async fn list(&self, status: Option<RideStatus>) -> Result<Vec<Ride>> {
        RideStore::list(&self.inner, status).await
    }

    async fn transition(&self, id: RideId, from: RideStatus, to: RideStatus) -> Result<StatusWrite> {
        if self.fail_transition.load(Ordering::SeqCst) {
            self.drop_off();
            return Err(outage("write ride status"));
        }
        let write = self.inner.transition(id, from, to).await?;
        if self.stall_transition.load(Ordering::SeqCst) {
            self.drop_off();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(write)
    }

    async fn set_payment_status(&self, id: RideId, status: PaymentStatus) -> Result<Option<Ride>> {
        if self.fail_payment_status.load(Ordering::SeqCst) {
            return Err(outage("record payment status"));
        }
        self.inner.set_payment_status(id, status).await
    }
}

/// Reconciliation log whose `resolve` can be switched off.
pub struct FaultyLog {
    pub inner: InMemoryLedger,
    pub fail_resolve: AtomicBool,
}

impl FaultyLog {
    pub fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            fail_resolve: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ReconciliationLog for FaultyLog {
    async fn record(&self, draft: TaskDraft) -> Result<ReconciliationTask> {
        self.inner.record(draft).await
    }

    async fn all(&self) -> Result<Vec<ReconciliationTask>> {
        self.inner.all().await
    }

    async fn pending(&self) -> Result<Vec<ReconciliationTask>> {
        self.inner.pending().await
    }

    async fn resolve(&self, id: TaskId) -> Result<Option<ReconciliationTask>> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(outage("resolve reconciliation task"));
        }
        self.inner.resolve(id).await
    }
}

/// Payment processor that can be taken down.
pub struct FaultyPayments {
    pub inner: LoggingPaymentGateway,
    pub down: AtomicBool,
    pub calls: AtomicU32,
}

impl FaultyPayments {
    pub fn new() -> Self {
        Self {
            inner: LoggingPaymentGateway::new(),
            down: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(outage("payment"));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FaultyPayments {
    async fn capture(&self, ride: RideId, fare: Fare) -> Result<()> {
        self.check()?;
        self.inner.capture(ride, fare).await
    }

    async fn refund(&self, ride: RideId, fare: Fare) -> Result<()> {
        self.check()?;
        self.inner.refund(ride, fare).await
    }

    async fn void(&self, ride: RideId) -> Result<()> {
        self.check()?;
        self.inner.void(ride).await
    }
}

/// A ledger wired to fault-injecting collaborators.
pub struct Harness {
    pub registry: RegistryService,
    pub ledger: Arc<RideLedger>,
    pub drivers: Arc<FaultyRegistry>,
    pub rides: Arc<FaultyRideStore>,
    pub log: Arc<FaultyLog>,
    pub payments: Arc<FaultyPayments>,
}

/// Short timeouts and no real waiting between retries.
pub fn fast_config() -> LedgerConfig {
    LedgerConfig {
        call_timeout: Duration::from_millis(200),
        retry: RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
    }
}

pub fn harness() -> Harness {
    harness_with(FaultyRideStore::new(InMemoryLedger::new()))
}

pub fn harness_with(rides: FaultyRideStore) -> Harness {
    let registry = InMemoryRegistry::new();
    let passengers = Arc::new(registry.clone());
    let log = Arc::new(FaultyLog::new(rides.inner.clone()));
    let drivers = Arc::new(FaultyRegistry::new(registry));
    let rides = Arc::new(rides);
    let payments = Arc::new(FaultyPayments::new());

    let ports = LedgerPorts {
        drivers: drivers.clone(),
        passengers: passengers.clone(),
        rides: rides.clone(),
        payments: payments.clone(),
        reconciliation: log.clone(),
    };
    Harness {
        registry: RegistryService::new(drivers.clone(), passengers),
        ledger: Arc::new(RideLedger::new(ports, fast_config())),
        drivers,
        rides,
        log,
        payments,
    }
}
