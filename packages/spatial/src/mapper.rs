//! Assigns census block groups to taxi zones.
//!
//! A block belongs to the zone containing its representative point. When
//! no zone contains that point (the block straddles a boundary or sits in
//! a gap between zones) the [`Fallback`] decides: by default the zone with
//! the largest intersection area wins. Blocks that intersect no zone are
//! left unassigned and never defaulted to a sentinel zone.

use std::collections::BTreeMap;

use attraction_geography::{LayerFeature, PolygonLayer};
use geo::{Centroid, InteriorPoint, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{SpatialError, ZoneIndex};

/// Which point stands in for a block during containment tests.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepresentativePoint {
    /// A point guaranteed to lie inside the block polygon.
    #[default]
    InteriorPoint,
    /// The area centroid, which may fall outside concave blocks.
    Centroid,
}

/// What to do with a block whose representative point is in no zone.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Fallback {
    /// Assign the zone with the greatest intersection area.
    #[default]
    LargestOverlap,
    /// Leave the block unassigned.
    Unassigned,
}

/// Block-to-zone assignment policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPolicy {
    /// Point used for the containment test.
    #[serde(default)]
    pub point: RepresentativePoint,
    /// Behaviour when containment fails.
    #[serde(default)]
    pub fallback: Fallback,
}

/// Immutable lookup from block identifier to zone identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockZoneMap {
    assignments: BTreeMap<String, String>,
    unassigned: Vec<String>,
    by_overlap: usize,
}

impl BlockZoneMap {
    /// Zone assigned to `block_id`, if any.
    #[must_use]
    pub fn zone_of(&self, block_id: &str) -> Option<&str> {
        self.assignments.get(block_id).map(String::as_str)
    }

    /// Number of assigned blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no block was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// `(block_id, zone_id)` pairs in block order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(block, zone)| (block.as_str(), zone.as_str()))
    }

    /// Blocks that intersect no zone (or were refused by the fallback).
    #[must_use]
    pub fn unassigned(&self) -> &[String] {
        &self.unassigned
    }

    /// How many assignments were decided by intersection area rather than
    /// by a single containing zone.
    #[must_use]
    pub const fn assigned_by_overlap(&self) -> usize {
        self.by_overlap
    }
}

/// How one block was resolved.
enum Resolution<'a> {
    Contained(&'a str),
    Overlap(&'a str),
    Unassigned,
}

/// Maps every block to a zone under `policy`.
///
/// # Errors
///
/// Returns [`SpatialError::CrsMismatch`] if the block layer was not
/// reprojected into the zone index's reference system.
pub fn map_blocks_to_zones(
    blocks: &PolygonLayer,
    zones: &ZoneIndex,
    policy: AssignmentPolicy,
) -> Result<BlockZoneMap, SpatialError> {
    zones.ensure_crs(blocks.label(), blocks.crs())?;

    let mut map = BlockZoneMap::default();

    for block in blocks.features() {
        match resolve_block(block, zones, policy) {
            Resolution::Contained(zone) => {
                map.assignments.insert(block.id.clone(), zone.to_string());
            }
            Resolution::Overlap(zone) => {
                map.by_overlap += 1;
                map.assignments.insert(block.id.clone(), zone.to_string());
            }
            Resolution::Unassigned => map.unassigned.push(block.id.clone()),
        }
    }

    log::info!(
        "Assigned {} of {} {} to zones ({} by overlap, {} unassigned)",
        map.len(),
        blocks.len(),
        blocks.label(),
        map.by_overlap,
        map.unassigned.len()
    );

    Ok(map)
}

fn resolve_block<'a>(
    block: &LayerFeature,
    zones: &'a ZoneIndex,
    policy: AssignmentPolicy,
) -> Resolution<'a> {
    let point: Option<Point<f64>> = match policy.point {
        RepresentativePoint::InteriorPoint => block.geometry.interior_point(),
        RepresentativePoint::Centroid => block.geometry.centroid(),
    };

    let containing = point.map(|p| zones.zones_containing(&p)).unwrap_or_default();

    match containing.as_slice() {
        [zone] => Resolution::Contained(*zone),
        [first, ..] => {
            // Overlapping zones: break the tie by shared area.
            let best = largest_overlap(block, zones, |id| containing.iter().any(|c| *c == id));
            Resolution::Overlap(best.unwrap_or(*first))
        }
        [] => match policy.fallback {
            Fallback::LargestOverlap => {
                largest_overlap(block, zones, |_| true).map_or(Resolution::Unassigned, Resolution::Overlap)
            }
            Fallback::Unassigned => Resolution::Unassigned,
        },
    }
}

/// Zone with the greatest positive intersection area among those passing
/// `keep`. Ties go to the lowest zone identifier.
fn largest_overlap<'a>(
    block: &LayerFeature,
    zones: &'a ZoneIndex,
    keep: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for (zone, area) in zones.overlap_areas(&block.geometry) {
        if !keep(zone) {
            continue;
        }
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((zone, area)),
        }
    }
    best.map(|(zone, _)| zone)
}

#[cfg(test)]
mod tests {
    use attraction_geography_models::Crs;
    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::tests::{rect, two_zones};

    fn blocks(features: Vec<LayerFeature>) -> PolygonLayer {
        PolygonLayer::new("census blocks", Crs::NY_LONG_ISLAND, features)
    }

    #[test]
    fn assigns_contained_blocks() {
        let index = ZoneIndex::build(&two_zones());
        let layer = blocks(vec![
            rect("B1", 1.0, 1.0, 3.0, 3.0),
            rect("B2", 4.0, 4.0, 6.0, 6.0),
            rect("B3", 12.0, 1.0, 14.0, 3.0),
        ]);

        let map = map_blocks_to_zones(&layer, &index, AssignmentPolicy::default()).unwrap();

        assert_eq!(map.zone_of("B1"), Some("3"));
        assert_eq!(map.zone_of("B2"), Some("3"));
        assert_eq!(map.zone_of("B3"), Some("4"));
        assert_eq!(map.assigned_by_overlap(), 0);
        assert!(map.unassigned().is_empty());
    }

    #[test]
    fn straddling_block_goes_to_largest_overlap() {
        let index = ZoneIndex::build(&two_zones());
        // Both centroids sit on the shared edge x = 10 with equal halves on
        // either side.
        let layer = blocks(vec![rect("B", 8.0, 0.0, 12.0, 2.0), rect("C", 7.0, 0.0, 13.0, 2.0)]);
        let policy = AssignmentPolicy {
            point: RepresentativePoint::Centroid,
            fallback: Fallback::LargestOverlap,
        };

        let map = map_blocks_to_zones(&layer, &index, policy).unwrap();

        // Equal halves: lowest zone id wins.
        assert_eq!(map.zone_of("B"), Some("3"));
        assert_eq!(map.zone_of("C"), Some("3"));
        assert_eq!(map.assigned_by_overlap(), 2);
    }

    #[test]
    fn uneven_straddle_prefers_bigger_share() {
        let index = ZoneIndex::build(&two_zones());
        // Centroid balances on x = 10, but two thirds of the area is in
        // zone 4.
        let block = LayerFeature {
            id: "L".to_string(),
            name: None,
            geometry: MultiPolygon(vec![polygon![
                (x: 8.0, y: 0.0),
                (x: 11.0, y: 0.0),
                (x: 11.0, y: 4.0),
                (x: 10.0, y: 4.0),
                (x: 10.0, y: 1.0),
                (x: 8.0, y: 1.0),
            ]]),
        };
        let policy = AssignmentPolicy {
            point: RepresentativePoint::Centroid,
            fallback: Fallback::LargestOverlap,
        };

        let map = map_blocks_to_zones(&blocks(vec![block]), &index, policy).unwrap();
        assert_eq!(map.zone_of("L"), Some("4"));
    }

    #[test]
    fn unassigned_fallback_leaves_straddlers_out() {
        let index = ZoneIndex::build(&two_zones());
        let layer = blocks(vec![rect("B", 8.0, 0.0, 12.0, 2.0)]);
        let policy = AssignmentPolicy {
            point: RepresentativePoint::Centroid,
            fallback: Fallback::Unassigned,
        };

        let map = map_blocks_to_zones(&layer, &index, policy).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.unassigned(), ["B".to_string()]);
    }

    #[test]
    fn block_outside_all_zones_is_unassigned() {
        let index = ZoneIndex::build(&two_zones());
        let layer = blocks(vec![rect("far", 50.0, 50.0, 52.0, 52.0)]);

        let map = map_blocks_to_zones(&layer, &index, AssignmentPolicy::default()).unwrap();
        assert_eq!(map.zone_of("far"), None);
        assert_eq!(map.unassigned(), ["far".to_string()]);
    }

    #[test]
    fn each_block_appears_once() {
        let index = ZoneIndex::build(&two_zones());
        let layer = blocks(vec![
            rect("B1", 1.0, 1.0, 3.0, 3.0),
            rect("B2", 8.0, 0.0, 14.0, 2.0),
            rect("B3", 50.0, 50.0, 51.0, 51.0),
        ]);

        let map = map_blocks_to_zones(&layer, &index, AssignmentPolicy::default()).unwrap();
        let assigned: Vec<&str> = map.iter().map(|(block, _)| block).collect();
        assert_eq!(assigned, vec!["B1", "B2"]);
        assert_eq!(map.len() + map.unassigned().len(), layer.len());
    }

    #[test]
    fn rejects_unprojected_blocks() {
        let index = ZoneIndex::build(&two_zones());
        let layer = PolygonLayer::new("census blocks", Crs::NAD83, vec![rect("B1", 1.0, 1.0, 3.0, 3.0)]);
        assert!(matches!(
            map_blocks_to_zones(&layer, &index, AssignmentPolicy::default()),
            Err(SpatialError::CrsMismatch { .. })
        ));
    }

    #[test]
    fn policy_parses_from_toml() {
        let policy: AssignmentPolicy =
            toml::de::from_str("point = \"centroid\"\nfallback = \"unassigned\"").unwrap();
        assert_eq!(policy.point, RepresentativePoint::Centroid);
        assert_eq!(policy.fallback, Fallback::Unassigned);

        let default: AssignmentPolicy = toml::de::from_str("").unwrap();
        assert_eq!(default, AssignmentPolicy::default());
        assert_eq!(Fallback::LargestOverlap.to_string(), "largest_overlap");
    }
}
