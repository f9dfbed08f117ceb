use super::LedgerPorts;
use super::retry::{retry_with_backoff, with_timeout};
use crate::config::LedgerConfig;
use crate::domain::driver::DriverId;
use crate::domain::ports::{
    DriverRegistryRef, PaymentGateway, PaymentGatewayRef, ReconciliationLogRef, RideStoreRef,
};
use crate::domain::pricing::Fare;
use crate::domain::reconciliation::{ReconciliationAction, ReconciliationTask, TaskDraft};
use crate::domain::ride::{PaymentAction, PaymentStatus, RideId, RideStatus};
use crate::error::{EntityKind, Result, RideError};
use std::time::Duration;

/// Sends one payment action to the processor.
pub(crate) async fn perform_payment(
    gateway: &dyn PaymentGateway,
    ride: RideId,
    fare: Fare,
    action: PaymentAction,
) -> Result<()> {
    match action {
        PaymentAction::Capture => gateway.capture(ride, fare).await,
        PaymentAction::Refund => gateway.refund(ride, fare).await,
        PaymentAction::Void => gateway.void(ride).await,
    }
}

/// Appends a task to the reconciliation log.
///
/// A failure to record is logged rather than returned: the caller is already
/// on a failure path and has nothing left to fall back on.
pub(crate) async fn record_task(log: &ReconciliationLogRef, limit: Duration, draft: TaskDraft) {
    let action = draft.action;
    match with_timeout("record reconciliation task", limit, log.record(draft)).await {
        Ok(task) => {
            tracing::warn!(task_id = %task.id, ride_id = ?task.ride_id, %action, "Reconciliation task recorded");
        }
        Err(err) => {
            tracing::error!(%action, error = %err, "Could not record reconciliation task");
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub resolved: Vec<ReconciliationTask>,
    pub still_pending: Vec<ReconciliationTask>,
}

/// Replays side effects that exhausted their retries.
pub struct Reconciler {
    rides: RideStoreRef,
    drivers: DriverRegistryRef,
    payments: PaymentGatewayRef,
    log: ReconciliationLogRef,
    config: LedgerConfig,
}

impl Reconciler {
    pub fn new(ports: &LedgerPorts, config: LedgerConfig) -> Self {
        Self {
            rides: ports.rides.clone(),
            drivers: ports.drivers.clone(),
            payments: ports.payments.clone(),
            log: ports.reconciliation.clone(),
            config,
        }
    }

    /// Replays every pending task once, resolving the ones that succeed.
    pub async fn run(&self) -> Result<ReconciliationReport> {
        let limit = self.config.call_timeout;
        let pending = with_timeout("list reconciliation tasks", limit, self.log.pending()).await?;
        let mut report = ReconciliationReport::default();

        for task in pending {
            let outcome = match self.replay(&task).await {
                Ok(()) => with_timeout("resolve reconciliation task", limit, self.log.resolve(task.id))
                    .await
                    .and_then(|resolved| {
                        resolved.ok_or_else(|| {
                            RideError::not_found(EntityKind::ReconciliationTask, task.id)
                        })
                    }),
                Err(err) => Err(err),
            };
            // A replayed task whose resolution was not recorded stays pending;
            // every replay is idempotent, so the next pass may run it again.
            match outcome {
                Ok(resolved) => {
                    tracing::info!(task_id = %task.id, action = %task.action, "Reconciliation task resolved");
                    report.resolved.push(resolved);
                }
                Err(err) => {
                    tracing::warn!(task_id = %task.id, action = %task.action, error = %err, "Reconciliation task still pending");
                    report.still_pending.push(task);
                }
            }
        }
        Ok(report)
    }

    async fn replay(&self, task: &ReconciliationTask) -> Result<()> {
        match task.action {
            ReconciliationAction::ReleaseDriver { driver_id } => self.release(driver_id).await,
            ReconciliationAction::RecordPaymentStatus { status } => {
                self.record_payment(ride_of(task)?, status).await
            }
            ReconciliationAction::CapturePayment => {
                self.pay(ride_of(task)?, PaymentAction::Capture).await
            }
            ReconciliationAction::RefundPayment => {
                self.pay(ride_of(task)?, PaymentAction::Refund).await
            }
            ReconciliationAction::VoidPayment => self.pay(ride_of(task)?, PaymentAction::Void).await,
        }
    }

    /// Releases a driver unless it has since been assigned an active ride.
    ///
    /// The ride check and the release are separate calls on separate stores.
    /// A dispatch that claims the driver between them, before its ride is
    /// written, loses the driver to this release.
    async fn release(&self, driver_id: DriverId) -> Result<()> {
        let limit = self.config.call_timeout;
        for status in [RideStatus::Assigned, RideStatus::InProgress] {
            let active = with_timeout("list rides", limit, self.rides.list(Some(status))).await?;
            if active.iter().any(|ride| ride.driver_id == driver_id) {
                tracing::info!(%driver_id, "Driver is on an active ride, release no longer owed");
                return Ok(());
            }
        }
        retry_with_backoff("release driver", self.config.retry, limit, || {
            self.drivers.release(driver_id)
        })
        .await?;
        Ok(())
    }

    async fn pay(&self, ride_id: RideId, action: PaymentAction) -> Result<()> {
        let limit = self.config.call_timeout;
        let ride = with_timeout("get ride", limit, self.rides.get(ride_id))
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Ride, ride_id))?;
        // Tasks from an unconfirmed status write that never landed.
        if !action.is_owed_by(ride.status) {
            tracing::info!(%ride_id, status = %ride.status, ?action, "Payment no longer owed");
            return Ok(());
        }
        retry_with_backoff("payment", self.config.retry, limit, || {
            perform_payment(self.payments.as_ref(), ride.id, ride.fare, action)
        })
        .await?;
        let status = action.resulting_status();
        if status != ride.payment_status {
            self.record_payment(ride_id, status).await?;
        }
        Ok(())
    }

    async fn record_payment(&self, ride_id: RideId, status: PaymentStatus) -> Result<()> {
        retry_with_backoff(
            "record payment status",
            self.config.retry,
            self.config.call_timeout,
            || self.rides.set_payment_status(ride_id, status),
        )
        .await?
        .ok_or_else(|| RideError::not_found(EntityKind::Ride, ride_id))?;
        Ok(())
    }
}

fn ride_of(task: &ReconciliationTask) -> Result<RideId> {
    task.ride_id.ok_or_else(|| {
        RideError::ValidationError(format!(
            "reconciliation task {} has no ride to {}",
            task.id, task.action
        ))
    })
}
