#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for the visitor and taxi passenger comparison.
//!
//! These are the flat, geometry-free rows written to CSV and the summary
//! printed at the end of a run.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Relative taxi use of a zone compared to the other zones of the same
/// run, by tercile of the passenger/visitor ratio.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaxiUsage {
    /// Bottom third of defined ratios.
    Low,
    /// Middle third.
    Medium,
    /// Top third.
    High,
}

impl TaxiUsage {
    /// Places `ratio` relative to the tercile cut points `low_cut` and
    /// `high_cut` (`low_cut <= high_cut`).
    #[must_use]
    pub fn from_ratio(ratio: f64, low_cut: f64, high_cut: f64) -> Self {
        if ratio <= low_cut {
            Self::Low
        } else if ratio <= high_cut {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// One zone's visitor count, taxi passengers, and their ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRatioRow {
    /// Taxi zone identifier.
    pub zone_id: String,
    /// Taxi zone name, when the zone layer has one.
    pub zone_name: Option<String>,
    /// Visitors to the attraction whose home block maps to this zone.
    pub visitors: u64,
    /// Taxi passengers picked up here and dropped off at the attraction.
    pub passengers: Option<u64>,
    /// `passengers / visitors`.
    pub ratio: Option<f64>,
    /// Tercile of `ratio` among all zones with a defined ratio.
    pub taxi_usage: Option<TaxiUsage>,
}

/// One block group and the taxi zone it was assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockZoneRow {
    /// Block group identifier.
    pub block_id: String,
    /// Assigned taxi zone identifier.
    pub zone_id: String,
    /// Borough of the block group, for NYC block groups.
    pub borough: Option<String>,
}

/// Totals and data-quality counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run name from the configuration.
    pub name: String,
    /// Zones whose polygon intersects the attraction.
    pub attraction_zones: Vec<String>,
    /// Points of interest inside the attraction.
    pub points_in_attraction: u64,
    /// Block groups assigned to a zone.
    pub blocks_assigned: u64,
    /// Block groups that intersect no zone.
    pub blocks_unassigned: u64,
    /// Origin entries skipped because the count was a placeholder.
    pub suppressed_entries: u64,
    /// Origin entries skipped because the count could not be read.
    pub malformed_entries: u64,
    /// Points of interest whose origin mapping could not be parsed.
    pub unparseable_records: u64,
    /// Visitor counts lost because their block has no zone.
    pub visitors_unassigned: u64,
    /// Zones in the comparison.
    pub zones: u64,
    /// Zones with at least one matching taxi pickup.
    pub zones_with_passengers: u64,
    /// Sum of visitors over compared zones.
    pub total_visitors: u64,
    /// Sum of passengers over compared zones.
    pub total_passengers: u64,
    /// Trips ending in an attraction zone.
    pub trips_matched: u64,
    /// Mean of the defined ratios.
    pub mean_ratio: Option<f64>,
}
