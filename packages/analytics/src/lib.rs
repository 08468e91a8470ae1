#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Correlates attraction visitors with taxi passengers per taxi zone.
//!
//! A run loads the block group, taxi zone, and attraction polygons, maps
//! every block group to a zone, sums the attraction's visitors by home
//! zone, sums taxi passengers by pickup zone for trips ending at the
//! attraction, and reports `passengers / visitors` per zone. Each step is
//! a pure function over in-memory tables; [`pipeline::run_pipeline`]
//! wires them together from a [`config::RunConfig`].

pub mod config;
pub mod export;
pub mod pipeline;
pub mod presets;
pub mod progress;

use std::path::PathBuf;

use attraction_geography::GeographyError;
use attraction_spatial::SpatialError;
use attraction_trips::TripError;
use attraction_visits::VisitError;
use thiserror::Error;

pub use config::RunConfig;
pub use pipeline::{PipelineOutput, ZoneComparison, run_pipeline};

/// Errors that can occur during a pipeline run.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A polygon layer could not be loaded.
    #[error(transparent)]
    Geography(#[from] GeographyError),

    /// A spatial operation was given inconsistent inputs.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Visit data could not be loaded.
    #[error(transparent)]
    Visits(#[from] VisitError),

    /// Trip data could not be loaded.
    #[error(transparent)]
    Trips(#[from] TripError),

    /// A run configuration could not be parsed.
    #[error("Invalid run configuration {name}: {source}")]
    Config {
        /// File path or preset name.
        name: String,
        /// Underlying TOML error.
        source: Box<toml::de::Error>,
    },

    /// No preset with this name is registered.
    #[error("Unknown preset '{name}' (available: {available})")]
    UnknownPreset {
        /// Requested preset.
        name: String,
        /// Comma-separated registered presets.
        available: String,
    },

    /// An output or configuration file could not be read or written.
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A CSV export failed.
    #[error("Failed to write CSV {}: {source}", path.display())]
    Csv {
        /// File that failed.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A `GeoJSON` export failed to serialize.
    #[error("Failed to serialize GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}
