#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Mobile-phone visit data: loading points of interest, keeping the ones
//! inside the attraction, and summing visitors per origin block group.

pub mod count;
pub mod load;

use std::path::PathBuf;

use thiserror::Error;

pub use count::{count_visits, parse_origin_counts, parse_visit_count};
pub use load::{load_visits, restrict_to_attraction};

/// Errors that can occur while reading visit data.
#[derive(Debug, Error)]
pub enum VisitError {
    /// The visit file could not be opened.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The visit file is not valid CSV for the expected columns.
    #[error("Invalid visit CSV {}: {source}", path.display())]
    Csv {
        /// File that failed.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Points could not be brought into the attraction's reference system.
    #[error(transparent)]
    Geography(#[from] attraction_geography::GeographyError),
}
