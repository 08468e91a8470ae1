#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system identifiers and polygon layer source
//! definitions.
//!
//! These types describe *where* polygon layers (census block groups,
//! taxi zones, the attraction polygon) come from and which reference
//! system their coordinates are expressed in. They are deserialized from
//! the TOML run definitions and carry no geometry themselves.

pub mod fips;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate reference system, identified by its EPSG code.
///
/// Written and parsed as `"EPSG:nnnn"`. Whether a code can actually be
/// transformed is decided when a reprojection is set up, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 geographic longitude/latitude in degrees.
    pub const WGS84: Self = Self(4326);
    /// NAD83 geographic longitude/latitude in degrees (Census TIGER/Line).
    pub const NAD83: Self = Self(4269);
    /// Spherical Web Mercator in metres.
    pub const WEB_MERCATOR: Self = Self(3857);
    /// NAD83 / New York Long Island state plane in US survey feet (NYC TLC
    /// taxi zone shapefile).
    pub const NY_LONG_ISLAND: Self = Self(2263);

    /// Wraps an EPSG code. Zero is not a valid code.
    #[must_use]
    pub const fn from_epsg(code: u32) -> Option<Self> {
        if code == 0 { None } else { Some(Self(code)) }
    }

    /// Returns the EPSG code of this reference system.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A reference system name that is not of the form `EPSG:nnnn`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected a reference system like \"EPSG:4326\", got {0:?}")]
pub struct ParseCrsError(String);

impl FromStr for Crs {
    type Err = ParseCrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .and_then(|_| trimmed.get(5..))
            .and_then(|code| code.trim().parse::<u32>().ok())
            .and_then(Self::from_epsg)
            .ok_or_else(|| ParseCrsError(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = ParseCrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Where a polygon layer is read from and how its features are keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSource {
    /// Path to a `.shp` shapefile or a `GeoJSON` `FeatureCollection`.
    pub path: PathBuf,
    /// Property holding the unique feature identifier (e.g. `"GEOID"`).
    pub id_field: String,
    /// Optional property holding a human-readable feature name.
    #[serde(default)]
    pub name_field: Option<String>,
    /// Overrides the reference system declared by the file itself.
    #[serde(default)]
    pub crs: Option<Crs>,
    /// Keep only features whose identifier starts with one of these
    /// prefixes. Empty keeps everything.
    #[serde(default)]
    pub id_prefixes: Vec<String>,
}

impl LayerSource {
    /// Returns a copy whose relative path is resolved against `base`.
    #[must_use]
    pub fn resolved(&self, base: &Path) -> Self {
        Self {
            path: resolve_path(base, &self.path),
            ..self.clone()
        }
    }
}

/// How the attraction polygon is defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttractionSource {
    /// A hand-drawn ring of `[x, y]` vertices.
    Ring {
        /// Ring vertices; closed automatically when the last vertex does
        /// not repeat the first.
        coordinates: Vec<[f64; 2]>,
        /// Reference system of `coordinates` (default WGS 84).
        #[serde(default = "default_ring_crs")]
        crs: Crs,
    },
    /// A polygon layer file; all polygons in it form the attraction.
    File {
        /// Path to a `.shp` or `GeoJSON` file.
        path: PathBuf,
        /// Overrides the reference system declared by the file itself.
        #[serde(default)]
        crs: Option<Crs>,
    },
}

impl AttractionSource {
    /// Returns a copy whose relative file path (if any) is resolved
    /// against `base`.
    #[must_use]
    pub fn resolved(&self, base: &Path) -> Self {
        match self {
            Self::Ring { .. } => self.clone(),
            Self::File { path, crs } => Self::File {
                path: resolve_path(base, path),
                crs: *crs,
            },
        }
    }
}

const fn default_ring_crs() -> Crs {
    Crs::WGS84
}

/// Joins `path` onto `base` unless it is already absolute.
#[must_use]
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
