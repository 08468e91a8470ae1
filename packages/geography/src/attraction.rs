//! The attraction polygon whose incoming visits and trips are measured.

use attraction_geography_models::{AttractionSource, Crs};
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};

use crate::GeographyError;
use crate::crs::reproject;
use crate::load::read_features;

/// A single area of interest with its reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct Attraction {
    crs: Crs,
    polygon: MultiPolygon<f64>,
}

impl Attraction {
    /// Builds an attraction from a ring of `[x, y]` vertices.
    ///
    /// The ring is closed automatically when the last vertex does not
    /// repeat the first.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::InvalidGeometry`] if the ring has fewer
    /// than three distinct vertices or non-finite coordinates.
    pub fn from_ring(coordinates: &[[f64; 2]], crs: Crs) -> Result<Self, GeographyError> {
        if coordinates.iter().flatten().any(|v| !v.is_finite()) {
            return Err(GeographyError::InvalidGeometry {
                message: "attraction ring has non-finite coordinates".to_string(),
            });
        }

        let mut coords: Vec<Coord<f64>> = coordinates
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        coords.dedup();

        if coords.len() < 3 {
            return Err(GeographyError::InvalidGeometry {
                message: format!(
                    "attraction ring needs at least 3 distinct vertices, got {}",
                    coords.len()
                ),
            });
        }

        // LineString -> Polygon closes the exterior ring.
        let polygon = Polygon::new(LineString::from(coords), vec![]);
        Ok(Self {
            crs,
            polygon: MultiPolygon(vec![polygon]),
        })
    }

    /// Wraps an existing geometry.
    #[must_use]
    pub const fn from_geometry(polygon: MultiPolygon<f64>, crs: Crs) -> Self {
        Self { crs, polygon }
    }

    /// Builds the attraction from its configured source.
    ///
    /// For file sources every polygon in the file becomes part of the
    /// attraction.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the file cannot be read, its
    /// reference system is unknown, or it contains no polygons.
    pub fn load(source: &AttractionSource) -> Result<Self, GeographyError> {
        match source {
            AttractionSource::Ring { coordinates, crs } => Self::from_ring(coordinates, *crs),
            AttractionSource::File { path, crs } => {
                let (crs, features) = read_features(path, &[], *crs)?;
                let polygons: Vec<Polygon<f64>> =
                    features.into_iter().flat_map(|f| f.geometry.0).collect();
                if polygons.is_empty() {
                    return Err(GeographyError::InvalidGeometry {
                        message: format!("{} contains no polygons", path.display()),
                    });
                }
                log::info!(
                    "Loaded attraction polygon ({} parts) from {} in {crs}",
                    polygons.len(),
                    path.display()
                );
                Ok(Self::from_geometry(MultiPolygon(polygons), crs))
            }
        }
    }

    /// Reference system of the polygon.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// The attraction geometry.
    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// Returns a copy expressed in `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the polygon cannot be reprojected.
    pub fn reproject(&self, target: Crs) -> Result<Self, GeographyError> {
        Ok(Self {
            crs: target,
            polygon: reproject(&self.polygon, self.crs, target)?,
        })
    }

    /// Whether `point` (already in this attraction's reference system) lies
    /// strictly inside the polygon. Points on the boundary are outside.
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.polygon.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, point};

    use super::*;

    /// Astoria outline used by the bundled preset.
    const ASTORIA: &[[f64; 2]] = &[
        [-73.9326, 40.7723],
        [-73.9096, 40.7716],
        [-73.9132, 40.7637],
        [-73.9220, 40.7563],
        [-73.9387, 40.7574],
        [-73.9428, 40.7686],
        [-73.9326, 40.7723],
    ];

    #[test]
    fn builds_closed_ring() {
        let attraction = Attraction::from_ring(ASTORIA, Crs::WGS84).unwrap();
        let exterior = attraction.polygon().0[0].exterior();
        assert!(exterior.is_closed());
        assert_eq!(exterior.0.len(), 7);
        assert!(attraction.contains(&point!(x: -73.925, y: 40.765)));
        assert!(!attraction.contains(&point!(x: -73.95, y: 40.765)));
    }

    #[test]
    fn closes_open_rings() {
        let open = &ASTORIA[..6];
        let closed = Attraction::from_ring(ASTORIA, Crs::WGS84).unwrap();
        assert_eq!(Attraction::from_ring(open, Crs::WGS84).unwrap(), closed);
    }

    #[test]
    fn rejects_degenerate_rings() {
        let err = Attraction::from_ring(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]], Crs::WGS84);
        assert!(matches!(err, Err(GeographyError::InvalidGeometry { .. })));
        let nan = Attraction::from_ring(&[[0.0, 0.0], [1.0, f64::NAN], [1.0, 0.0]], Crs::WGS84);
        assert!(nan.is_err());
    }

    #[test]
    fn boundary_points_are_outside() {
        let square = Attraction::from_ring(
            &[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]],
            Crs::NY_LONG_ISLAND,
        )
        .unwrap();
        assert!(square.contains(&point!(x: 1.0, y: 1.0)));
        assert!(!square.contains(&point!(x: 2.0, y: 1.0)));
    }

    #[test]
    fn reprojects_into_zone_crs() {
        let attraction = Attraction::from_ring(ASTORIA, Crs::WGS84).unwrap();
        let projected = attraction.reproject(Crs::NY_LONG_ISLAND).unwrap();
        assert_eq!(projected.crs(), Crs::NY_LONG_ISLAND);
        // Roughly 2.3 km x 1.8 km; well over ten million square feet.
        assert!(projected.polygon().unsigned_area() > 1.0e7);
        assert_eq!(attraction.reproject(Crs::WGS84).unwrap(), attraction);
    }
}
