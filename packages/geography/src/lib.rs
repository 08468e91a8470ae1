#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon layer loading and reference system normalization.
//!
//! Reads census block groups, taxi zones, and the attraction polygon from
//! shapefiles or `GeoJSON`, resolves each layer's coordinate reference
//! system, and reprojects layers into a common system before any spatial
//! predicate is evaluated. A layer whose reference system cannot be
//! identified fails to load rather than being silently compared in the
//! wrong coordinates.

pub mod attraction;
pub mod crs;
pub mod layer;
pub mod load;

use std::path::PathBuf;

use attraction_geography_models::Crs;
use thiserror::Error;

pub use attraction::Attraction;
pub use layer::{LayerFeature, PolygonLayer};
pub use load::load_layer;

/// Errors that can occur while loading or reprojecting polygon layers.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// An input file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A `GeoJSON` document could not be parsed.
    #[error("Invalid GeoJSON in {}: {source}", path.display())]
    GeoJson {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        source: Box<geojson::Error>,
    },

    /// A shapefile could not be read.
    #[error("Invalid shapefile {}: {source}", path.display())]
    Shapefile {
        /// File that failed.
        path: PathBuf,
        /// Underlying shapefile error.
        source: shapefile::Error,
    },

    /// The layer's coordinate reference system is missing or unsupported.
    #[error("Unknown coordinate reference system for {}: {detail}", path.display())]
    UnknownCrs {
        /// File whose reference system could not be resolved.
        path: PathBuf,
        /// What was found instead.
        detail: String,
    },

    /// PROJ could not set up a transformation between two systems.
    #[error("Cannot reproject from {from} to {to}: {source}")]
    Projection {
        /// Source reference system.
        from: Crs,
        /// Target reference system.
        to: Crs,
        /// Underlying PROJ error.
        source: Box<proj::ProjCreateError>,
    },

    /// A coordinate could not be transformed.
    #[error("Failed to transform a coordinate from {from} to {to}: {source}")]
    Transform {
        /// Source reference system.
        from: Crs,
        /// Target reference system.
        to: Crs,
        /// Underlying PROJ error.
        source: Box<proj::ProjError>,
    },

    /// The file extension is not a supported vector format.
    #[error("Unsupported vector format: {}", path.display())]
    UnsupportedFormat {
        /// Offending file.
        path: PathBuf,
    },

    /// A geometry could not be used as a polygon.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what went wrong.
        message: String,
    },
}
