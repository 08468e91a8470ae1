#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for mobile-phone visit data.
//!
//! A [`VisitRecord`] is one point of interest with the raw origin mapping
//! as published (block group identifier to visitor count). Counts below
//! the publisher's reporting threshold arrive as placeholder text and are
//! represented by [`VisitCount::Suppressed`] rather than being coerced to
//! zero.

use serde::{Deserialize, Serialize};

/// One point of interest from the visit dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Stable POI identifier, when the dataset provides one.
    pub placekey: Option<String>,
    /// Display name of the location.
    pub location_name: String,
    /// WGS 84 latitude.
    pub latitude: f64,
    /// WGS 84 longitude.
    pub longitude: f64,
    /// Raw JSON object text mapping origin block group to visitor count.
    pub visitor_home_cbgs: String,
    /// Total visits recorded at the location.
    pub raw_visit_counts: Option<u64>,
    /// Distinct visitors recorded at the location.
    pub raw_visitor_counts: Option<u64>,
}

/// A single parsed visit-count token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitCount {
    /// A non-negative integer count.
    Numeric(u64),
    /// A below-threshold placeholder such as `"<4"`.
    Suppressed,
    /// Anything else.
    Malformed,
}

impl VisitCount {
    /// The count, if this token carries one.
    #[must_use]
    pub const fn numeric(self) -> Option<u64> {
        match self {
            Self::Numeric(n) => Some(n),
            Self::Suppressed | Self::Malformed => None,
        }
    }
}

/// Visitors originating from one block group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVisitTotal {
    /// Block group identifier (12-digit GEOID).
    pub block_id: String,
    /// Summed numeric visitor counts.
    pub visitors: u64,
}

/// Tally of how each origin entry was treated while counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStats {
    /// Records examined.
    pub records: u64,
    /// Records whose origin mapping could not be parsed.
    pub unparseable_records: u64,
    /// Entries with a numeric count for a known block.
    pub numeric: u64,
    /// Entries carrying a below-threshold placeholder.
    pub suppressed: u64,
    /// Entries whose count was neither numeric nor a placeholder.
    pub malformed: u64,
    /// Numeric entries for blocks outside the block layer.
    pub unknown_block: u64,
}

/// Per-block visit totals with the tally that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVisitCounts {
    /// One row per block, ordered by block identifier.
    pub totals: Vec<BlockVisitTotal>,
    /// How origin entries were treated.
    pub stats: CountStats,
}

impl BlockVisitCounts {
    /// Sum of all block totals.
    #[must_use]
    pub fn total_visitors(&self) -> u64 {
        self.totals.iter().map(|t| t.visitors).sum()
    }
}
