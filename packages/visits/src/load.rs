//! Point-of-interest CSV loading and attraction filtering.

use std::fs::File;
use std::path::Path;

use attraction_geography::Attraction;
use attraction_geography::crs::Reprojector;
use attraction_geography_models::Crs;
use attraction_visits_models::VisitRecord;
use geo::{Coord, Point};
use serde::Deserialize;

use crate::VisitError;
use crate::count::parse_origin_counts;

/// One CSV row as published. Every column is optional text so that a
/// single bad cell skips its row instead of failing the file.
#[derive(Debug, Deserialize)]
struct PoiRow {
    #[serde(default)]
    placekey: Option<String>,
    #[serde(default)]
    location_name: Option<String>,
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
    #[serde(default)]
    visitor_home_cbgs: Option<String>,
    #[serde(default)]
    raw_visit_counts: Option<String>,
    #[serde(default)]
    raw_visitor_counts: Option<String>,
}

/// Loads every point of interest from a CSV file.
///
/// Rows with missing, unparseable, or zero coordinates are skipped. The
/// origin mapping is kept as raw text and parsed later by the counter.
///
/// # Errors
///
/// Returns [`VisitError::Io`] if the file cannot be opened and
/// [`VisitError::Csv`] if a row cannot be decoded.
pub fn load_visits(path: &Path) -> Result<Vec<VisitRecord>, VisitError> {
    let file = File::open(path).map_err(|source| VisitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let mut records = Vec::new();
    let mut skipped: u64 = 0;

    for row in reader.deserialize::<PoiRow>() {
        let row = row.map_err(|source| VisitError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(record) = row_to_record(row) {
            records.push(record);
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        log::warn!(
            "{}: skipped {skipped} rows without usable coordinates",
            path.display()
        );
    }
    log::info!("Loaded {} points of interest from {}", records.len(), path.display());

    Ok(records)
}

fn row_to_record(row: PoiRow) -> Option<VisitRecord> {
    let (latitude, longitude) = parse_lat_lng(row.latitude.as_deref(), row.longitude.as_deref())?;
    Some(VisitRecord {
        placekey: row.placekey.filter(|s| !s.trim().is_empty()),
        location_name: row.location_name.unwrap_or_default(),
        latitude,
        longitude,
        visitor_home_cbgs: row.visitor_home_cbgs.unwrap_or_default(),
        raw_visit_counts: row.raw_visit_counts.as_deref().and_then(parse_count),
        raw_visitor_counts: row.raw_visitor_counts.as_deref().and_then(parse_count),
    })
}

/// Parses lat/lng text. Returns `None` if missing, unparseable,
/// non-finite, or zero.
fn parse_lat_lng(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() || latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}

/// Parses a whole-number count, accepting the `12.0` form that
/// spreadsheet exports produce.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < 1.8e19).then_some(f as u64)
}

/// The record's location as a WGS 84 point.
#[must_use]
pub const fn record_point(record: &VisitRecord) -> Point<f64> {
    Point(Coord {
        x: record.longitude,
        y: record.latitude,
    })
}

/// Keeps the records located strictly inside the attraction that report
/// at least one origin block group.
///
/// Points are reprojected into the attraction's reference system before
/// the containment test. Records on the boundary are excluded.
///
/// # Errors
///
/// Returns [`VisitError::Geography`] if the points cannot be reprojected
/// into the attraction's reference system.
pub fn restrict_to_attraction(
    records: Vec<VisitRecord>,
    attraction: &Attraction,
) -> Result<Vec<VisitRecord>, VisitError> {
    let total = records.len();
    let reprojector = Reprojector::new(Crs::WGS84, attraction.crs())?;

    let mut kept = Vec::new();
    for record in records {
        let point = Point(reprojector.coord(record_point(&record).0)?);
        if attraction.contains(&point) && has_origins(&record) {
            kept.push(record);
        }
    }

    log::info!(
        "{} of {total} points of interest lie inside the attraction",
        kept.len()
    );
    Ok(kept)
}

/// Whether the origin mapping is present and non-empty. Unparseable text
/// is kept so that the counter can tally it.
fn has_origins(record: &VisitRecord) -> bool {
    match parse_origin_counts(&record.visitor_home_cbgs) {
        Some(origins) => !origins.is_empty(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn record(name: &str, latitude: f64, longitude: f64, origins: &str) -> VisitRecord {
        VisitRecord {
            placekey: None,
            location_name: name.to_string(),
            latitude,
            longitude,
            visitor_home_cbgs: origins.to_string(),
            raw_visit_counts: None,
            raw_visitor_counts: None,
        }
    }

    #[test]
    fn loads_rows_and_skips_bad_coordinates() {
        let file = write_csv(
            "placekey,location_name,latitude,longitude,visitor_home_cbgs,raw_visit_counts,naics_code\n\
             zzw-222@627,Vessel,40.7538,-74.0022,\"{\"\"360610099001\"\":4}\",120.0,712110\n\
             ,No coords,,,{},,\n\
             ,Null island,0,0,{},,\n\
             ,Garbage,abc,-74.0,{},,\n",
        );

        let records = load_visits(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        let vessel = &records[0];
        assert_eq!(vessel.placekey.as_deref(), Some("zzw-222@627"));
        assert_eq!(vessel.location_name, "Vessel");
        assert_eq!(vessel.visitor_home_cbgs, r#"{"360610099001":4}"#);
        assert_eq!(vessel.raw_visit_counts, Some(120));
        assert_eq!(vessel.raw_visitor_counts, None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_visits(Path::new("/nonexistent/poi.csv")).unwrap_err();
        assert!(matches!(err, VisitError::Io { .. }));
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" 12.0 "), Some(12));
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn keeps_points_inside_attraction() {
        let attraction = Attraction::from_ring(
            &[[-74.01, 40.75], [-74.00, 40.75], [-74.00, 40.76], [-74.01, 40.76]],
            Crs::WGS84,
        )
        .unwrap()
        .reproject(Crs::NY_LONG_ISLAND)
        .unwrap();

        let records = vec![
            record("inside", 40.755, -74.005, r#"{"360610099001":4}"#),
            record("outside", 40.80, -73.95, r#"{"360610099001":4}"#),
            record("no origins", 40.755, -74.006, "{}"),
            record("blank origins", 40.755, -74.006, ""),
            record("garbled origins", 40.755, -74.007, "not json"),
        ];

        let kept = restrict_to_attraction(records, &attraction).unwrap();
        let names: Vec<&str> = kept.iter().map(|r| r.location_name.as_str()).collect();
        assert_eq!(names, vec!["inside", "garbled origins"]);
    }
}
