use super::{PersonName, entity_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

entity_id!(
    /// Identity of a registered driver.
    DriverId
);

/// Outcome of releasing a driver back into the available pool.
///
/// Both variants are successes: compensation and reconciliation paths may
/// release the same driver more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    AlreadyAvailable,
}

/// A driver as owned by the registry.
///
/// `is_available` is true iff the driver is not the assigned driver of an
/// active ride. It only changes through [`Driver::claim`] and
/// [`Driver::release`] (or the registry's explicit status override).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Driver {
    pub id: DriverId,
    pub name: PersonName,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    /// A freshly registered driver, available by default.
    pub fn new(id: DriverId, name: PersonName) -> Self {
        Self {
            id,
            name,
            is_available: true,
            created_at: Utc::now(),
        }
    }

    /// Flips availability to false. Returns false if the driver was already busy,
    /// in which case nothing changes.
    pub fn claim(&mut self) -> bool {
        if self.is_available {
            self.is_available = false;
            true
        } else {
            false
        }
    }

    /// Flips availability to true. Idempotent.
    pub fn release(&mut self) -> ReleaseOutcome {
        if self.is_available {
            ReleaseOutcome::AlreadyAvailable
        } else {
            self.is_available = true;
            ReleaseOutcome::Released
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rick() -> Driver {
        Driver::new(DriverId(1), PersonName::new("Rick").unwrap())
    }

    #[test]
    fn test_new_driver_is_available() {
        assert!(rick().is_available);
    }

    #[test]
    fn test_claim_only_succeeds_once() {
        let mut driver = rick();
        assert!(driver.claim());
        assert!(!driver.is_available);
        assert!(!driver.claim());
        assert!(!driver.is_available);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut driver = rick();
        driver.claim();
        assert_eq!(driver.release(), ReleaseOutcome::Released);
        assert_eq!(driver.release(), ReleaseOutcome::AlreadyAvailable);
        assert!(driver.is_available);
    }
}
