use super::LedgerPorts;
use super::reconcile::{perform_payment, record_task};
use super::retry::{retry_with_backoff, with_timeout};
use crate::config::LedgerConfig;
use crate::domain::ports::{
    DriverRegistryRef, PaymentGatewayRef, ReconciliationLogRef, RideStoreRef, StatusWrite,
};
use crate::domain::reconciliation::{ReconciliationAction, TaskDraft};
use crate::domain::ride::{PaymentAction, Ride, RideId, RideStatus, TerminalEffects};
use crate::error::{EntityKind, Result, RideError};

/// The ride status state machine.
///
/// A status change is committed first with a compare-and-set on the ride, so
/// concurrent updates of one ride are serialized by the store. Terminal side
/// effects follow in a fixed order (payment, then driver release); each is
/// retried on its own and, when retries run out, recorded as a
/// reconciliation task instead of rolling the status back.
pub struct RideLifecycle {
    rides: RideStoreRef,
    drivers: DriverRegistryRef,
    payments: PaymentGatewayRef,
    reconciliation: ReconciliationLogRef,
    config: LedgerConfig,
}

impl RideLifecycle {
    pub fn new(ports: &LedgerPorts, config: LedgerConfig) -> Self {
        Self {
            rides: ports.rides.clone(),
            drivers: ports.drivers.clone(),
            payments: ports.payments.clone(),
            reconciliation: ports.reconciliation.clone(),
            config,
        }
    }

    /// Moves a ride to `next` and converges the side effects it owes.
    ///
    /// The returned ride reflects every side effect that completed; one that
    /// did not is logged and left in the reconciliation log, it never fails
    /// the transition.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the ride does not exist.
    /// * `InvalidTransition` if the transition table rejects the change,
    ///   including self-transitions and anything out of a terminal status.
    /// * `UpstreamUnavailable` if the status write failed, or its outcome
    ///   could not be confirmed by reading the ride back. In the latter case
    ///   the owed side effects are already in the reconciliation log.
    pub async fn update_status(&self, id: RideId, next: RideStatus) -> Result<Ride> {
        let limit = self.config.call_timeout;
        let current = with_timeout("get ride", limit, self.rides.get(id))
            .await?
            .ok_or_else(|| RideError::not_found(EntityKind::Ride, id))?;
        let mut expected = current.status;

        let ride = loop {
            expected.transition_to(next)?;
            match with_timeout(
                "write ride status",
                limit,
                self.rides.transition(id, expected, next),
            )
            .await
            {
                Ok(StatusWrite::Applied(ride)) => break ride,
                // Another update won the race; re-check against what it wrote.
                Ok(StatusWrite::Conflict(actual)) => expected = actual,
                Ok(StatusWrite::Missing) => {
                    return Err(RideError::not_found(EntityKind::Ride, id));
                }
                Err(err) if err.is_transient() => {
                    return self.recover_unconfirmed(&current, expected, next, err).await;
                }
                Err(err) => return Err(err),
            }
        };
        tracing::info!(ride_id = %id, from = %expected, to = %next, "Ride status updated");

        let effects = TerminalEffects::for_transition(expected, next, ride.payment_status);
        Ok(self.settle(ride, effects).await)
    }

    /// Handles a status write whose outcome is unknown: the store may have
    /// applied it before the call failed or timed out.
    ///
    /// The ride is read back. If it already holds `next`, the write landed
    /// and its side effects are settled as usual. If it cannot be read, every
    /// effect the transition would owe is recorded for reconciliation (replay
    /// checks the ride's status first) and the write error is returned.
    async fn recover_unconfirmed(
        &self,
        current: &Ride,
        expected: RideStatus,
        next: RideStatus,
        cause: RideError,
    ) -> Result<Ride> {
        let id = current.id;
        tracing::warn!(ride_id = %id, to = %next, error = %cause, "Status write unconfirmed, reading ride back");

        let stored = retry_with_backoff(
            "get ride",
            self.config.retry,
            self.config.call_timeout,
            || self.rides.get(id),
        )
        .await;
        match stored {
            Ok(Some(ride)) if ride.status == next => {
                tracing::info!(ride_id = %id, from = %expected, to = %next, "Ride status updated");
                let effects = TerminalEffects::for_transition(expected, next, ride.payment_status);
                Ok(self.settle(ride, effects).await)
            }
            Ok(Some(_)) => Err(cause),
            Ok(None) => Err(RideError::not_found(EntityKind::Ride, id)),
            Err(read_error) => {
                let effects =
                    TerminalEffects::for_transition(expected, next, current.payment_status);
                if let Some(action) = effects.payment {
                    self.escalate(id, action.into(), &read_error).await;
                }
                if effects.release_driver {
                    self.escalate(
                        id,
                        ReconciliationAction::ReleaseDriver {
                            driver_id: current.driver_id,
                        },
                        &read_error,
                    )
                    .await;
                }
                Err(cause)
            }
        }
    }

    async fn settle(&self, ride: Ride, effects: TerminalEffects) -> Ride {
        let mut ride = ride;
        if let Some(action) = effects.payment
            && let Some(updated) = self.settle_payment(&ride, action).await
        {
            ride = updated;
        }
        if effects.release_driver {
            self.release_driver(&ride).await;
        }
        ride
    }

    /// Calls the processor, then records the resulting payment status.
    /// Returns the updated ride when a new status was recorded.
    async fn settle_payment(&self, ride: &Ride, action: PaymentAction) -> Option<Ride> {
        let charged = retry_with_backoff(
            "payment",
            self.config.retry,
            self.config.call_timeout,
            || perform_payment(self.payments.as_ref(), ride.id, ride.fare, action),
        )
        .await;
        if let Err(err) = charged {
            self.escalate(ride.id, action.into(), &err).await;
            return None;
        }

        let status = action.resulting_status();
        if status == ride.payment_status {
            return None;
        }
        let recorded = retry_with_backoff(
            "record payment status",
            self.config.retry,
            self.config.call_timeout,
            || self.rides.set_payment_status(ride.id, status),
        )
        .await
        .and_then(|updated| {
            updated.ok_or_else(|| RideError::not_found(EntityKind::Ride, ride.id))
        });
        match recorded {
            Ok(updated) => {
                tracing::info!(ride_id = %ride.id, payment_status = %status, "Payment status recorded");
                Some(updated)
            }
            Err(err) => {
                self.escalate(
                    ride.id,
                    ReconciliationAction::RecordPaymentStatus { status },
                    &err,
                )
                .await;
                None
            }
        }
    }

    async fn release_driver(&self, ride: &Ride) {
        let driver_id = ride.driver_id;
        let released = retry_with_backoff(
            "release driver",
            self.config.retry,
            self.config.call_timeout,
            || self.drivers.release(driver_id),
        )
        .await;
        match released {
            Ok(outcome) => {
                tracing::info!(ride_id = %ride.id, %driver_id, ?outcome, "Driver released");
            }
            Err(err) => {
                self.escalate(
                    ride.id,
                    ReconciliationAction::ReleaseDriver { driver_id },
                    &err,
                )
                .await;
            }
        }
    }

    async fn escalate(&self, ride_id: RideId, action: ReconciliationAction, cause: &RideError) {
        let required = RideError::ReconciliationRequired { ride_id, action };
        tracing::error!(%ride_id, cause = %cause, "{required}");
        record_task(
            &self.reconciliation,
            self.config.call_timeout,
            TaskDraft {
                ride_id: Some(ride_id),
                action,
                reason: cause.to_string(),
            },
        )
        .await;
    }
}
