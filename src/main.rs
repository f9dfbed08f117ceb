use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use ridenow::application::LedgerPorts;
use ridenow::application::ledger::RideLedger;
use ridenow::application::registry::RegistryService;
use ridenow::config::LedgerConfig;
use ridenow::domain::ports::{
    DriverRegistryRef, PassengerRegistryRef, ReconciliationLogRef, RideStoreRef,
};
use ridenow::infrastructure::in_memory::{InMemoryLedger, InMemoryRegistry};
use ridenow::infrastructure::payment::LoggingPaymentGateway;
use ridenow::interfaces::batch::BatchRunner;
use ridenow::interfaces::csv::command_reader::CommandReader;
use ridenow::interfaces::csv::report_writer::ReportWriter;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Report {
    Rides,
    Drivers,
    Passengers,
    Reconciliation,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Final state written to stdout
    #[arg(long, value_enum, default_value_t = Report::Rides)]
    report: Report,

    /// Deadline for each store or payment call, in milliseconds
    #[arg(long, env = "RIDENOW_CALL_TIMEOUT_MS", default_value_t = 5000)]
    call_timeout_ms: u64,

    /// Retries for compensations and terminal side effects
    #[arg(long, env = "RIDENOW_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// First backoff delay, doubled on every retry
    #[arg(long, env = "RIDENOW_RETRY_DELAY_MS", default_value_t = 100)]
    retry_delay_ms: u64,
}

struct Stores {
    drivers: DriverRegistryRef,
    passengers: PassengerRegistryRef,
    rides: RideStoreRef,
    reconciliation: ReconciliationLogRef,
}

fn in_memory_stores() -> Stores {
    let registry = Arc::new(InMemoryRegistry::new());
    let ledger = Arc::new(InMemoryLedger::new());
    Stores {
        drivers: registry.clone(),
        passengers: registry,
        rides: ledger.clone(),
        reconciliation: ledger,
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use ridenow::infrastructure::rocksdb::{RocksDBLedger, RocksDBRegistry};

    let Some(db_path) = db_path else {
        return Ok(in_memory_stores());
    };
    // Registry and ledger are independent databases with no shared transaction.
    let registry = Arc::new(RocksDBRegistry::open(db_path.join("registry")).into_diagnostic()?);
    let ledger = Arc::new(RocksDBLedger::open(db_path.join("ledger")).into_diagnostic()?);
    Ok(Stores {
        drivers: registry.clone(),
        passengers: registry,
        rides: ledger.clone(),
        reconciliation: ledger,
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        tracing::warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();

    let cli = Cli::parse();
    let config = LedgerConfig::new(cli.call_timeout_ms, cli.max_retries, cli.retry_delay_ms);

    let stores = open_stores(cli.db_path)?;
    let registry = RegistryService::new(stores.drivers.clone(), stores.passengers.clone());
    let ledger = RideLedger::new(
        LedgerPorts {
            drivers: stores.drivers,
            passengers: stores.passengers,
            rides: stores.rides,
            payments: Arc::new(LoggingPaymentGateway::new()),
            reconciliation: stores.reconciliation,
        },
        config,
    );
    let runner = BatchRunner::new(registry, Arc::new(ledger));

    // Process commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(command).await {
                    tracing::warn!(error = %e, "Error processing command");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error reading command");
            }
        }
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Rides => {
            let rides = runner.ledger().list_rides(None).await.into_diagnostic()?;
            writer.write_rides(&rides).into_diagnostic()?;
        }
        Report::Drivers => {
            let drivers = runner.registry().list_drivers(None).await.into_diagnostic()?;
            writer.write_drivers(&drivers).into_diagnostic()?;
        }
        Report::Passengers => {
            let passengers = runner.registry().list_passengers().await.into_diagnostic()?;
            writer.write_passengers(&passengers).into_diagnostic()?;
        }
        Report::Reconciliation => {
            let tasks = runner.ledger().reconciliation_tasks().await.into_diagnostic()?;
            writer.write_tasks(&tasks).into_diagnostic()?;
        }
    }

    Ok(())
}
