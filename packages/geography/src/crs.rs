//! Reprojection between coordinate reference systems.
//!
//! Transformations are delegated to PROJ. Both ends are normalized to
//! `x = easting/longitude, y = northing/latitude` axis order, so geographic
//! coordinates are always `(lon, lat)`.

use std::sync::LazyLock;

use attraction_geography_models::Crs;
use geo::{Coord, MapCoords};
use proj::Proj;
use regex::Regex;

use crate::GeographyError;

static AUTHORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[ *"EPSG" *, *"?([0-9]+)"? *\]"#).unwrap_or_else(|_| unreachable!())
});

/// A prepared transformation from one reference system to another.
///
/// Transforming into the same reference system is the identity and never
/// touches PROJ.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    proj: Option<Proj>,
}

impl Reprojector {
    /// Prepares the transformation `from` -> `to`.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::Projection`] if PROJ does not know one of
    /// the codes or cannot relate them.
    pub fn new(from: Crs, to: Crs) -> Result<Self, GeographyError> {
        if from == to {
            return Ok(Self {
                from,
                to,
                proj: None,
            });
        }
        let proj = Proj::new_known_crs(&from.to_string(), &to.to_string(), None).map_err(
            |source| GeographyError::Projection {
                from,
                to,
                source: Box::new(source),
            },
        )?;
        Ok(Self {
            from,
            to,
            proj: Some(proj),
        })
    }

    /// Transforms a single coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::Transform`] if the coordinate falls
    /// outside what PROJ can transform.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, GeographyError> {
        let Some(proj) = &self.proj else {
            return Ok(coord);
        };
        let (x, y) = proj
            .convert((coord.x, coord.y))
            .map_err(|source| GeographyError::Transform {
                from: self.from,
                to: self.to,
                source: Box::new(source),
            })?;
        Ok(Coord { x, y })
    }

    /// Transforms every coordinate of a `geo` geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::Transform`] on the first coordinate that
    /// cannot be transformed.
    pub fn geometry<G>(&self, geometry: &G) -> Result<G, GeographyError>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if self.proj.is_none() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.coord(coord))
    }
}

/// Reprojects any `geo` geometry from one reference system to another.
///
/// # Errors
///
/// Returns [`GeographyError`] if the transformation cannot be set up or a
/// coordinate cannot be transformed.
pub fn reproject<G>(geometry: &G, from: Crs, to: Crs) -> Result<G, GeographyError>
where
    G: MapCoords<f64, f64, Output = G> + Clone,
{
    Reprojector::new(from, to)?.geometry(geometry)
}

/// Finds the `AUTHORITY["EPSG", ...]` clause that belongs to the root WKT
/// object, ignoring authorities of nested objects such as the `GEOGCS` of
/// a `PROJCS`.
fn root_authority(wkt: &str) -> Option<u32> {
    let mut depth = 0usize;
    let mut scanned = 0usize;
    let mut found = None;

    for caps in AUTHORITY_RE.captures_iter(wkt) {
        let Some(whole) = caps.get(0) else { continue };
        for byte in &wkt.as_bytes()[scanned..whole.start()] {
            match byte {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        scanned = whole.start();
        if depth == 1 {
            found = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        }
    }
    found
}

/// Identifies the reference system described by a shapefile `.prj` (WKT1).
///
/// Prefers the root `AUTHORITY["EPSG", ...]` clause; ESRI-flavoured WKT
/// without one is matched on datum and projection names. A projected
/// system that cannot be identified yields `None`, never its geographic
/// base.
#[must_use]
pub fn detect_prj_crs(wkt: &str) -> Option<Crs> {
    let upper = wkt.to_ascii_uppercase();

    if let Some(code) = root_authority(&upper) {
        return Crs::from_epsg(code);
    }

    let upper = upper.replace(' ', "_");
    if upper.trim_start().starts_with("PROJCS") {
        if upper.contains("LONG_ISLAND") && (upper.contains("FEET") || upper.contains("FOOT_US")) {
            return Some(Crs::NY_LONG_ISLAND);
        }
        if upper.contains("WEB_MERCATOR")
            || upper.contains("PSEUDO-MERCATOR")
            || upper.contains("POPULAR_VISUALISATION")
        {
            return Some(Crs::WEB_MERCATOR);
        }
        return None;
    }

    if upper.contains("NORTH_AMERICAN_1983") || upper.contains("NAD83") || upper.contains("NAD_1983")
    {
        return Some(Crs::NAD83);
    }
    if upper.contains("WGS_1984") || upper.contains("WGS_84") || upper.contains("WGS84") {
        return Some(Crs::WGS84);
    }
    None
}

/// Identifies a reference system from an OGC URN or `EPSG:nnnn` name, as
/// found in the legacy `GeoJSON` `crs` member.
#[must_use]
pub fn detect_crs_name(name: &str) -> Option<Crs> {
    let upper = name.trim().to_ascii_uppercase();
    if upper.ends_with("CRS84") {
        return Some(Crs::WGS84);
    }
    let code = upper.rsplit(':').next()?.parse::<u32>().ok()?;
    Crs::from_epsg(code)
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    const ESB: Coord<f64> = Coord {
        x: -73.9857,
        y: 40.7484,
    };

    fn assert_close(a: Coord<f64>, b: Coord<f64>, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "{a:?} != {b:?} (tolerance {tol})"
        );
    }

    #[test]
    fn projects_to_ny_long_island_feet() {
        let to_state_plane = Reprojector::new(Crs::NAD83, Crs::NY_LONG_ISLAND).unwrap();
        let projected = to_state_plane.coord(ESB).unwrap();
        assert_close(
            projected,
            Coord {
                x: 988_212.24,
                y: 211_939.28,
            },
            0.5,
        );
    }

    #[test]
    fn origin_of_ny_long_island_is_false_easting() {
        let to_state_plane = Reprojector::new(Crs::NAD83, Crs::NY_LONG_ISLAND).unwrap();
        let projected = to_state_plane
            .coord(Coord {
                x: -74.0,
                y: 40.0 + 10.0 / 60.0,
            })
            .unwrap();
        assert_close(
            projected,
            Coord {
                x: 984_250.0,
                y: 0.0,
            },
            1e-3,
        );
    }

    #[test]
    fn ny_long_island_roundtrips() {
        let there = Reprojector::new(Crs::NAD83, Crs::NY_LONG_ISLAND)
            .unwrap()
            .coord(ESB)
            .unwrap();
        let back = Reprojector::new(Crs::NY_LONG_ISLAND, Crs::NAD83)
            .unwrap()
            .coord(there)
            .unwrap();
        assert_close(back, ESB, 1e-8);
    }

    #[test]
    fn wgs84_input_is_lon_lat() {
        let there = Reprojector::new(Crs::WGS84, Crs::WEB_MERCATOR)
            .unwrap()
            .coord(ESB)
            .unwrap();
        assert_close(
            there,
            Coord {
                x: -8_236_050.45,
                y: 4_975_301.25,
            },
            0.01,
        );
    }

    #[test]
    fn handles_codes_outside_the_named_set() {
        let utm_18n = Crs::from_epsg(32618).unwrap();
        let projected = Reprojector::new(Crs::WGS84, utm_18n)
            .unwrap()
            .coord(ESB)
            .unwrap();
        assert!((585_000.0..587_000.0).contains(&projected.x), "{projected:?}");
        assert!((4_511_000.0..4_512_000.0).contains(&projected.y), "{projected:?}");
    }

    #[test]
    fn unknown_codes_fail_to_prepare() {
        let bogus = Crs::from_epsg(999_999).unwrap();
        assert!(matches!(
            Reprojector::new(Crs::WGS84, bogus),
            Err(GeographyError::Projection { .. })
        ));
    }

    #[test]
    fn reprojecting_into_same_crs_is_identity() {
        let mp = MultiPolygon(vec![polygon![
            (x: 988_000.0, y: 211_000.0),
            (x: 989_000.0, y: 211_000.0),
            (x: 989_000.0, y: 212_000.0),
        ]]);
        assert_eq!(
            reproject(&mp, Crs::NY_LONG_ISLAND, Crs::NY_LONG_ISLAND).unwrap(),
            mp
        );
    }

    #[test]
    fn detects_ogc_wkt_by_root_authority() {
        let wkt = r#"PROJCS["NAD83 / New York Long Island (ftUS)",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],AUTHORITY["EPSG","4269"]],UNIT["US survey foot",0.3048006096012192],AUTHORITY["EPSG","2263"]]"#;
        assert_eq!(detect_prj_crs(wkt), Some(Crs::NY_LONG_ISLAND));

        let utm = r#"PROJCS["WGS 84 / UTM zone 18N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1],AUTHORITY["EPSG","32618"]]"#;
        assert_eq!(detect_prj_crs(utm), Crs::from_epsg(32618));
    }

    #[test]
    fn detects_esri_wkt_by_name() {
        let state_plane = r#"PROJCS["NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]]],PROJECTION["Lambert_Conformal_Conic"],UNIT["Foot_US",0.3048006096012192]]"#;
        assert_eq!(detect_prj_crs(state_plane), Some(Crs::NY_LONG_ISLAND));

        let nad83 = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(detect_prj_crs(nad83), Some(Crs::NAD83));

        let wgs84 = r#"GEOGCS["WGS84(DD)",DATUM["WGS84",SPHEROID["WGS84",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["degree",0.017453292519943295]]"#;
        assert_eq!(detect_prj_crs(wgs84), Some(Crs::WGS84));
    }

    #[test]
    fn rejects_unsupported_projection() {
        let utm = r#"PROJCS["WGS_1984_UTM_Zone_18N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"],UNIT["Meter",1.0]]"#;
        assert_eq!(detect_prj_crs(utm), None);

        let metric_state_plane = r#"PROJCS["NAD_1983_StatePlane_New_York_Long_Island_FIPS_3104",GEOGCS["GCS_North_American_1983"],UNIT["Meter",1.0]]"#;
        assert_eq!(detect_prj_crs(metric_state_plane), None);

        // Only the geographic base carries an authority.
        let base_only = r#"PROJCS["NAD83 / UTM zone 18N",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4269"]],PROJECTION["Transverse_Mercator"],PARAMETER["central_meridian",-75],UNIT["metre",1]]"#;
        assert_eq!(detect_prj_crs(base_only), None);
    }

    #[test]
    fn detects_geojson_crs_names() {
        assert_eq!(
            detect_crs_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::WGS84)
        );
        assert_eq!(
            detect_crs_name("urn:ogc:def:crs:EPSG::2263"),
            Some(Crs::NY_LONG_ISLAND)
        );
        assert_eq!(detect_crs_name("EPSG:4269"), Some(Crs::NAD83));
        assert_eq!(detect_crs_name("EPSG:27700"), Crs::from_epsg(27700));
        assert_eq!(detect_crs_name("urn:ogc:def:crs:OGC::unknown"), None);
    }
}
