#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index over taxi zones.
//!
//! Builds an R-tree of zone polygons once per run and answers the three
//! spatial questions the pipeline asks: which zone contains a point, how
//! much of a polygon overlaps each zone, and which zones intersect the
//! attraction polygon.

pub mod mapper;

use std::collections::BTreeSet;

use attraction_geography::{Attraction, PolygonLayer};
use attraction_geography_models::Crs;
use geo::{Area, BooleanOps, BoundingRect, Contains, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use mapper::{AssignmentPolicy, BlockZoneMap, Fallback, RepresentativePoint, map_blocks_to_zones};

/// Errors raised by spatial predicates.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Two inputs were not reprojected into the same reference system.
    #[error("Reference system mismatch: {left} is in {left_crs}, {right} is in {right_crs}")]
    CrsMismatch {
        /// First input label.
        left: String,
        /// First input's reference system.
        left_crs: Crs,
        /// Second input label.
        right: String,
        /// Second input's reference system.
        right_crs: Crs,
    },
}

/// A zone polygon stored in the R-tree with its identifier.
struct ZoneEntry {
    zone_id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over one zone layer.
pub struct ZoneIndex {
    label: String,
    crs: Crs,
    zones: RTree<ZoneEntry>,
}

impl ZoneIndex {
    /// Builds the R-tree from a zone layer.
    #[must_use]
    pub fn build(zones: &PolygonLayer) -> Self {
        let entries: Vec<ZoneEntry> = zones
            .features()
            .iter()
            .filter_map(|feature| {
                let Some(envelope) = compute_envelope(&feature.geometry) else {
                    log::warn!("Zone {} has an empty geometry; not indexed", feature.id);
                    return None;
                };
                Some(ZoneEntry {
                    zone_id: feature.id.clone(),
                    envelope,
                    polygon: feature.geometry.clone(),
                })
            })
            .collect();

        let zones_tree = RTree::bulk_load(entries);
        log::info!(
            "Indexed {} {} polygons in {}",
            zones_tree.size(),
            zones.label(),
            zones.crs()
        );

        Self {
            label: zones.label().to_string(),
            crs: zones.crs(),
            zones: zones_tree,
        }
    }

    /// Reference system of the indexed zones.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of indexed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.size()
    }

    /// Whether no zones are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.size() == 0
    }

    /// Identifiers of every zone whose polygon contains `point`, in
    /// identifier order. Boundary points are not contained.
    #[must_use]
    pub fn zones_containing(&self, point: &Point<f64>) -> Vec<&str> {
        let query_env = AABB::from_point([point.x(), point.y()]);
        let mut hits: Vec<&str> = self
            .zones
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(point))
            .map(|entry| entry.zone_id.as_str())
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Intersection area between `polygon` and every zone it overlaps,
    /// in identifier order. Zones touching only along an edge are omitted.
    #[must_use]
    pub fn overlap_areas(&self, polygon: &MultiPolygon<f64>) -> Vec<(&str, f64)> {
        let Some(query_env) = compute_envelope(polygon) else {
            return Vec::new();
        };
        let mut overlaps: Vec<(&str, f64)> = self
            .zones
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(polygon))
            .map(|entry| {
                (
                    entry.zone_id.as_str(),
                    entry.polygon.intersection(polygon).unsigned_area(),
                )
            })
            .filter(|(_, area)| *area > 0.0)
            .collect();
        overlaps.sort_unstable_by(|a, b| a.0.cmp(b.0));
        overlaps
    }

    /// Identifiers of every zone whose polygon intersects the attraction.
    ///
    /// This is an intersection test, not containment: a zone that only
    /// partially overlaps the attraction is included.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CrsMismatch`] if the attraction was not
    /// reprojected into the zone reference system.
    pub fn zones_intersecting(&self, attraction: &Attraction) -> Result<BTreeSet<String>, SpatialError> {
        self.ensure_crs("attraction", attraction.crs())?;

        let polygon = attraction.polygon();
        let Some(query_env) = compute_envelope(polygon) else {
            return Ok(BTreeSet::new());
        };

        Ok(self
            .zones
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(polygon))
            .map(|entry| entry.zone_id.clone())
            .collect())
    }

    fn ensure_crs(&self, other: &str, other_crs: Crs) -> Result<(), SpatialError> {
        if other_crs == self.crs {
            Ok(())
        } else {
            Err(SpatialError::CrsMismatch {
                left: self.label.clone(),
                left_crs: self.crs,
                right: other.to_string(),
                right_crs: other_crs,
            })
        }
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
