//! In-memory polygon layers.

use std::collections::{BTreeMap, BTreeSet};

use attraction_geography_models::Crs;
use geo::MultiPolygon;

use crate::GeographyError;
use crate::crs::Reprojector;

/// One keyed polygon feature of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFeature {
    /// Unique identifier within the layer (block GEOID, taxi zone id).
    pub id: String,
    /// Optional human-readable name.
    pub name: Option<String>,
    /// Polygon geometry in the layer's reference system.
    pub geometry: MultiPolygon<f64>,
}

/// A set of polygon features sharing one coordinate reference system.
///
/// Identifiers are unique: features sharing an identifier are merged into
/// a single multipolygon when the layer is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonLayer {
    label: String,
    crs: Crs,
    features: Vec<LayerFeature>,
    by_id: BTreeMap<String, usize>,
}

impl PolygonLayer {
    /// Builds a layer, merging features that share an identifier.
    #[must_use]
    pub fn new(label: impl Into<String>, crs: Crs, features: Vec<LayerFeature>) -> Self {
        let label = label.into();
        let mut merged: Vec<LayerFeature> = Vec::with_capacity(features.len());
        let mut by_id = BTreeMap::new();

        for feature in features {
            if let Some(&idx) = by_id.get(&feature.id) {
                log::warn!(
                    "{label}: merging duplicate feature id {} into one multipolygon",
                    feature.id
                );
                let existing: &mut LayerFeature = &mut merged[idx];
                existing.geometry.0.extend(feature.geometry.0);
                if existing.name.is_none() {
                    existing.name = feature.name;
                }
            } else {
                by_id.insert(feature.id.clone(), merged.len());
                merged.push(feature);
            }
        }

        Self {
            label,
            crs,
            features: merged,
            by_id,
        }
    }

    /// Human-readable layer label used in log messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reference system shared by every feature.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Features in load order.
    #[must_use]
    pub fn features(&self) -> &[LayerFeature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Looks up a feature by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LayerFeature> {
        self.by_id.get(id).map(|&idx| &self.features[idx])
    }

    /// All feature identifiers.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<String> {
        self.by_id.keys().cloned().collect()
    }

    /// Returns a copy of this layer with every geometry expressed in
    /// `target`. Reprojecting into the layer's own reference system
    /// returns an identical layer.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the two systems cannot be related or
    /// a vertex cannot be transformed.
    pub fn reproject(&self, target: Crs) -> Result<Self, GeographyError> {
        if target == self.crs {
            return Ok(self.clone());
        }
        log::debug!("Reprojecting {} from {} to {target}", self.label, self.crs);

        let reprojector = Reprojector::new(self.crs, target)?;
        let features = self
            .features
            .iter()
            .map(|feature| {
                Ok(LayerFeature {
                    id: feature.id.clone(),
                    name: feature.name.clone(),
                    geometry: reprojector.geometry(&feature.geometry)?,
                })
            })
            .collect::<Result<Vec<_>, GeographyError>>()?;

        Ok(Self {
            label: self.label.clone(),
            crs: target,
            features,
            by_id: self.by_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, polygon};

    use super::*;

    fn square(id: &str, x: f64, y: f64) -> LayerFeature {
        LayerFeature {
            id: id.to_string(),
            name: None,
            geometry: MultiPolygon(vec![polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
            ]]),
        }
    }

    #[test]
    fn merges_duplicate_ids() {
        let layer = PolygonLayer::new(
            "zones",
            Crs::WGS84,
            vec![square("103", 0.0, 0.0), square("7", 5.0, 5.0), square("103", 2.0, 0.0)],
        );
        assert_eq!(layer.len(), 2);
        let merged = layer.get("103").unwrap();
        assert_eq!(merged.geometry.0.len(), 2);
        assert!((merged.geometry.unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn reproject_into_own_crs_is_noop() {
        let layer = PolygonLayer::new("zones", Crs::NY_LONG_ISLAND, vec![square("1", 988_000.0, 211_000.0)]);
        assert_eq!(layer.reproject(Crs::NY_LONG_ISLAND).unwrap(), layer);
    }

    #[test]
    fn reproject_changes_crs_and_keeps_ids() {
        let layer = PolygonLayer::new("blocks", Crs::NAD83, vec![square("360610001001", -74.0, 40.7)]);
        let projected = layer.reproject(Crs::NY_LONG_ISLAND).unwrap();
        assert_eq!(projected.crs(), Crs::NY_LONG_ISLAND);
        assert_eq!(projected.ids(), layer.ids());
        assert_ne!(projected.features()[0].geometry, layer.features()[0].geometry);
    }
}
