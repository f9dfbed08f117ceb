//! Route pricing.
//!
//! The fare is a pure function of the route: no clock, no store, no market.
//! `fare = BASE_FARE + HOP_RATE * hops`, where `hops` is derived from a stable
//! FNV-1a hash of both normalized zone names, so the same route always costs
//! the same on every process and platform.

use super::ride::Zone;
use crate::error::RideError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Charged for every ride, including same-zone trips.
pub const BASE_FARE: Decimal = dec!(10.00);
/// Charged per hop between zones.
pub const HOP_RATE: Decimal = dec!(2.50);
/// Number of distinct hop counts a route can map to.
pub const HOP_BUCKETS: u64 = 20;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A non-negative ride price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Fare(Decimal);

impl Fare {
    pub fn new(value: Decimal) -> Result<Self, RideError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(RideError::ValidationError(
                "Fare must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Fare {
    type Error = RideError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fare> for Decimal {
    fn from(fare: Fare) -> Self {
        fare.0
    }
}

impl fmt::Display for Fare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn fnv1a(zone: &Zone) -> u64 {
    zone.as_str()
        .trim()
        .to_lowercase()
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
}

/// Number of hops between two zones, in `0..HOP_BUCKETS`.
pub fn hops(origin: &Zone, destination: &Zone) -> u64 {
    (fnv1a(origin) ^ fnv1a(destination)) % HOP_BUCKETS
}

/// Quotes the fare for a route.
pub fn quote(origin: &Zone, destination: &Zone) -> Fare {
    Fare(BASE_FARE + HOP_RATE * Decimal::from(hops(origin, destination)))
}
