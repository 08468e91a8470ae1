//! TOML run definitions.
//!
//! A run names its three polygon layers, the visit and trip files, the
//! block assignment policy, and where to write results. Input paths are
//! relative to the data directory given at load time.

use std::path::{Path, PathBuf};

use attraction_geography_models::{AttractionSource, Crs, LayerSource, resolve_path};
use attraction_spatial::AssignmentPolicy;
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Short run name used in logs and the summary.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Census block group layer.
    pub blocks: LayerSource,
    /// Taxi zone layer.
    pub zones: LayerSource,
    /// The attraction polygon.
    pub attraction: AttractionSource,
    /// Points-of-interest CSV.
    pub visits: PathBuf,
    /// Taxi trip records (Parquet or CSV).
    pub trips: PathBuf,
    /// Reference system all layers are compared in. Defaults to the zone
    /// layer's own.
    #[serde(default)]
    pub working_crs: Option<Crs>,
    /// Block-to-zone assignment policy.
    #[serde(default)]
    pub assignment: AssignmentPolicy,
    /// Result files.
    #[serde(default)]
    pub output: OutputPaths,
}

/// Where results are written. Missing entries are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Per-zone comparison as a `GeoJSON` `FeatureCollection`.
    #[serde(default)]
    pub geojson: Option<PathBuf>,
    /// Per-zone comparison as CSV, without geometry.
    #[serde(default)]
    pub csv: Option<PathBuf>,
    /// Block group to zone assignments as CSV.
    #[serde(default)]
    pub block_zones: Option<PathBuf>,
}

impl RunConfig {
    /// Parses a run definition. `name` labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Config`] if the TOML is invalid.
    pub fn from_toml_str(name: &str, toml_str: &str) -> Result<Self, AnalyticsError> {
        toml::de::from_str(toml_str).map_err(|e| AnalyticsError::Config {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    /// Reads and parses a run definition file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Io`] if the file cannot be read and
    /// [`AnalyticsError::Config`] if it is not a valid definition.
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AnalyticsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&path.display().to_string(), &contents)
    }

    /// Returns a copy with every relative input path joined onto
    /// `data_dir`. Output paths are left as given.
    #[must_use]
    pub fn resolved(&self, data_dir: &Path) -> Self {
        Self {
            blocks: self.blocks.resolved(data_dir),
            zones: self.zones.resolved(data_dir),
            attraction: self.attraction.resolved(data_dir),
            visits: resolve_path(data_dir, &self.visits),
            trips: resolve_path(data_dir, &self.trips),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use attraction_spatial::{Fallback, RepresentativePoint};

    use super::*;

    const MINIMAL: &str = r#"
name = "test"
visits = "poi.csv"
trips = "trips.parquet"

[blocks]
path = "blocks.shp"
id_field = "GEOID"
id_prefixes = ["36061"]

[zones]
path = "/abs/zones.geojson"
id_field = "objectid"
name_field = "zone"

[attraction]
type = "ring"
coordinates = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]
"#;

    #[test]
    fn parses_minimal_definition() {
        let config = RunConfig::from_toml_str("test", MINIMAL).unwrap();
        assert_eq!(config.name, "test");
        assert_eq!(config.blocks.id_prefixes, vec!["36061".to_string()]);
        assert_eq!(config.zones.name_field.as_deref(), Some("zone"));
        assert_eq!(config.assignment, AssignmentPolicy::default());
        assert_eq!(config.working_crs, None);
        assert_eq!(config.output, OutputPaths::default());
        assert!(matches!(
            config.attraction,
            AttractionSource::Ring { crs: Crs::WGS84, .. }
        ));
    }

    #[test]
    fn parses_policy_and_outputs() {
        let toml_str = format!(
            "working_crs = \"EPSG:2263\"\n{MINIMAL}\n[assignment]\npoint = \"centroid\"\nfallback = \"unassigned\"\n\n[output]\ncsv = \"out/zones.csv\"\n"
        );
        let config = RunConfig::from_toml_str("test", &toml_str).unwrap();
        assert_eq!(config.working_crs, Some(Crs::NY_LONG_ISLAND));
        assert_eq!(config.assignment.point, RepresentativePoint::Centroid);
        assert_eq!(config.assignment.fallback, Fallback::Unassigned);
        assert_eq!(config.output.csv, Some(PathBuf::from("out/zones.csv")));
    }

    #[test]
    fn resolves_relative_inputs_only() {
        let config = RunConfig::from_toml_str("test", MINIMAL)
            .unwrap()
            .resolved(Path::new("/data"));
        assert_eq!(config.visits, PathBuf::from("/data/poi.csv"));
        assert_eq!(config.trips, PathBuf::from("/data/trips.parquet"));
        assert_eq!(config.blocks.path, PathBuf::from("/data/blocks.shp"));
        assert_eq!(config.zones.path, PathBuf::from("/abs/zones.geojson"));
    }

    #[test]
    fn reports_invalid_toml() {
        let err = RunConfig::from_toml_str("broken", "name = ").unwrap_err();
        assert!(matches!(err, AnalyticsError::Config { ref name, .. } if name == "broken"));
    }
}
