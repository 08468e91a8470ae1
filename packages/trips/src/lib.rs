#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Taxi trip records and passenger totals per pickup zone.
//!
//! Trips are read from the yellow-taxi trip record schema
//! (`PULocationID`, `DOLocationID`, `passenger_count`) in Parquet or CSV
//! form. Only trips ending in the attraction's drop-off zones contribute
//! to the aggregate.

pub mod load;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use load::load_trips;

/// Errors that can occur while reading trip records.
#[derive(Debug, Error)]
pub enum TripError {
    /// The trip file could not be opened.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The trip CSV could not be decoded.
    #[error("Invalid trip CSV {}: {source}", path.display())]
    Csv {
        /// File that failed.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The trip Parquet file could not be decoded.
    #[cfg(feature = "parquet")]
    #[error("Invalid trip Parquet {}: {source}", path.display())]
    Parquet {
        /// File that failed.
        path: PathBuf,
        /// Underlying Polars error.
        source: polars::prelude::PolarsError,
    },

    /// A required column is absent.
    #[error("{} has no {column} column", path.display())]
    MissingColumn {
        /// File that failed.
        path: PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },

    /// The file extension is not a supported trip format.
    #[error("Unsupported trip file format: {}", path.display())]
    UnsupportedFormat {
        /// Offending file.
        path: PathBuf,
    },
}

/// One taxi trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Pickup taxi zone identifier.
    pub pickup_zone: String,
    /// Drop-off taxi zone identifier.
    pub dropoff_zone: String,
    /// Passenger count; `None` when the source left it blank.
    pub passengers: Option<u64>,
}

/// Passenger and trip totals for one pickup zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupTotal {
    /// Summed passenger counts. Trips with no count add nothing.
    pub passengers: u64,
    /// Number of trips.
    pub trips: u64,
}

/// Passenger totals per pickup zone for trips ending in a set of drop-off
/// zones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripAggregate {
    /// Totals keyed by pickup zone identifier.
    pub by_pickup: BTreeMap<String, PickupTotal>,
    /// Trips examined.
    pub trips_considered: u64,
    /// Trips whose drop-off zone was in the set.
    pub trips_matched: u64,
}

impl TripAggregate {
    /// Passenger total for `zone_id`, if any matched trip started there.
    #[must_use]
    pub fn passengers(&self, zone_id: &str) -> Option<u64> {
        self.by_pickup.get(zone_id).map(|t| t.passengers)
    }

    /// Sum of passengers over every pickup zone.
    #[must_use]
    pub fn total_passengers(&self) -> u64 {
        self.by_pickup.values().map(|t| t.passengers).sum()
    }
}

/// Sums passengers per pickup zone over trips whose drop-off zone is in
/// `dropoff_zones`.
///
/// A matched trip with no passenger count still registers its pickup
/// zone, with nothing added to the passenger total.
#[must_use]
pub fn aggregate_passengers(trips: &[TripRecord], dropoff_zones: &BTreeSet<String>) -> TripAggregate {
    let mut aggregate = TripAggregate::default();

    for trip in trips {
        aggregate.trips_considered += 1;
        if !dropoff_zones.contains(&trip.dropoff_zone) {
            continue;
        }
        aggregate.trips_matched += 1;
        let total = aggregate.by_pickup.entry(trip.pickup_zone.clone()).or_default();
        total.trips += 1;
        total.passengers = total.passengers.saturating_add(trip.passengers.unwrap_or(0));
    }

    log::info!(
        "{} of {} trips end in {} attraction zones; {} pickup zones, {} passengers",
        aggregate.trips_matched,
        aggregate.trips_considered,
        dropoff_zones.len(),
        aggregate.by_pickup.len(),
        aggregate.total_passengers()
    );

    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(pickup: &str, dropoff: &str, passengers: Option<u64>) -> TripRecord {
        TripRecord {
            pickup_zone: pickup.to_string(),
            dropoff_zone: dropoff.to_string(),
            passengers,
        }
    }

    fn zones(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn counts_only_trips_into_attraction_zones() {
        let trips = [
            trip("100", "3", Some(2)),
            trip("100", "4", Some(5)),
            trip("200", "3", Some(1)),
            trip("100", "3", Some(1)),
        ];
        let aggregate = aggregate_passengers(&trips, &zones(&["3"]));

        assert_eq!(aggregate.passengers("100"), Some(3));
        assert_eq!(aggregate.passengers("200"), Some(1));
        assert_eq!(aggregate.by_pickup["100"].trips, 2);
        assert_eq!(aggregate.trips_considered, 4);
        assert_eq!(aggregate.trips_matched, 3);
        assert_eq!(aggregate.total_passengers(), 4);
    }

    #[test]
    fn missing_passenger_count_keeps_pickup_zone() {
        let trips = [trip("7", "3", None)];
        let aggregate = aggregate_passengers(&trips, &zones(&["3"]));
        assert_eq!(aggregate.passengers("7"), Some(0));
        assert_eq!(aggregate.by_pickup["7"].trips, 1);
    }

    #[test]
    fn empty_dropoff_set_matches_nothing() {
        let trips = [trip("1", "3", Some(1))];
        let aggregate = aggregate_passengers(&trips, &BTreeSet::new());
        assert!(aggregate.by_pickup.is_empty());
        assert_eq!(aggregate.passengers("1"), None);
    }
}
