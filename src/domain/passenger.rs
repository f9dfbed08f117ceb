use super::{PersonName, entity_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

entity_id!(
    /// Identity of a registered passenger.
    PassengerId
);

/// A passenger record. Plain CRUD, no cross-entity invariant.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Passenger {
    pub id: PassengerId,
    pub name: PersonName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Passenger {
    pub fn new(id: PassengerId, name: PersonName) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rename(&mut self, name: PersonName) {
        self.name = name;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_touches_updated_at() {
        let mut passenger = Passenger::new(PassengerId(1), PersonName::new("Jerry").unwrap());
        let created = passenger.created_at;
        passenger.rename(PersonName::new("Beth").unwrap());
        assert_eq!(passenger.name.as_str(), "Beth");
        assert_eq!(passenger.created_at, created);
        assert!(passenger.updated_at >= created);
    }
}
