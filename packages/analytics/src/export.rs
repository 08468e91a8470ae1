//! Result files.
//!
//! `GeoJSON` output is always written in WGS 84 longitude/latitude, as
//! RFC 7946 requires, whatever reference system the run compared in.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use attraction_analytics_models::BlockZoneRow;
use attraction_geography::crs::Reprojector;
use attraction_geography_models::Crs;
use attraction_geography_models::fips::{borough_name, derive_county_geoid};
use attraction_spatial::BlockZoneMap;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, feature::Id};

use crate::AnalyticsError;
use crate::pipeline::ZoneComparison;

fn create(path: &Path) -> Result<BufWriter<File>, AnalyticsError> {
    let io_err = |source| AnalyticsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    File::create(path).map(BufWriter::new).map_err(io_err)
}

/// Builds the comparison `FeatureCollection`, reprojecting from `crs`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Geography`] if a zone cannot be reprojected.
pub fn comparison_features(
    comparisons: &[ZoneComparison],
    crs: Crs,
) -> Result<FeatureCollection, AnalyticsError> {
    let to_lon_lat = Reprojector::new(crs, Crs::WGS84)?;
    let features = comparisons
        .iter()
        .map(|zone| {
            let geometry = to_lon_lat.geometry(&zone.geometry)?;
            let mut properties = JsonObject::new();
            properties.insert("zone_id".to_string(), JsonValue::from(zone.zone_id.clone()));
            properties.insert("zone_name".to_string(), JsonValue::from(zone.zone_name.clone()));
            properties.insert("visitors".to_string(), JsonValue::from(zone.visitors));
            properties.insert("passengers".to_string(), JsonValue::from(zone.passengers));
            properties.insert("ratio".to_string(), JsonValue::from(zone.ratio));
            properties.insert(
                "taxi_usage".to_string(),
                JsonValue::from(zone.taxi_usage.map(|u| u.to_string())),
            );
            Ok(Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&geometry))),
                id: Some(Id::String(zone.zone_id.clone())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes the comparison as a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_geojson(path: &Path, comparisons: &[ZoneComparison], crs: Crs) -> Result<(), AnalyticsError> {
    let collection = comparison_features(comparisons, crs)?;
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush().map_err(|source| AnalyticsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote {} zones to {}", comparisons.len(), path.display());
    Ok(())
}

/// Writes the comparison as CSV without geometry.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_csv(path: &Path, comparisons: &[ZoneComparison]) -> Result<(), AnalyticsError> {
    let csv_err = |source| AnalyticsError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(create(path)?);
    for zone in comparisons {
        writer.serialize(zone.to_row()).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| AnalyticsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote {} zones to {}", comparisons.len(), path.display());
    Ok(())
}

/// Writes the block group to zone assignments as CSV, with the borough
/// of each NYC block group.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be written.
pub fn write_block_zone_csv(path: &Path, block_zones: &BlockZoneMap) -> Result<(), AnalyticsError> {
    let csv_err = |source| AnalyticsError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(create(path)?);
    for (block_id, zone_id) in block_zones.iter() {
        writer
            .serialize(BlockZoneRow {
                block_id: block_id.to_string(),
                zone_id: zone_id.to_string(),
                borough: derive_county_geoid(block_id)
                    .and_then(borough_name)
                    .map(ToString::to_string),
            })
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| AnalyticsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "Wrote {} block assignments to {}",
        block_zones.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use attraction_analytics_models::TaxiUsage;
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn zones() -> Vec<ZoneComparison> {
        vec![
            ZoneComparison {
                zone_id: "7".to_string(),
                zone_name: Some("Astoria".to_string()),
                geometry: MultiPolygon(vec![polygon![
                    (x: 1_005_000.0, y: 218_000.0),
                    (x: 1_010_000.0, y: 218_000.0),
                    (x: 1_010_000.0, y: 222_000.0),
                    (x: 1_005_000.0, y: 222_000.0),
                ]]),
                visitors: 10,
                passengers: None,
                ratio: None,
                taxi_usage: None,
            },
            ZoneComparison {
                zone_id: "68".to_string(),
                zone_name: None,
                geometry: MultiPolygon(vec![]),
                visitors: 4,
                passengers: Some(6),
                ratio: Some(1.5),
                taxi_usage: Some(TaxiUsage::High),
            },
        ]
    }

    #[test]
    fn geojson_is_in_lon_lat_with_nullable_properties() {
        let collection = comparison_features(&zones(), Crs::NY_LONG_ISLAND).unwrap();
        assert_eq!(collection.features.len(), 2);

        let astoria = &collection.features[0];
        assert_eq!(astoria.id, Some(Id::String("7".to_string())));
        let properties = astoria.properties.as_ref().unwrap();
        assert_eq!(properties["visitors"], 10);
        assert!(properties["passengers"].is_null());
        assert!(properties["ratio"].is_null());

        let geometry: geo::Geometry<f64> = astoria.geometry.clone().unwrap().try_into().unwrap();
        let geo::Geometry::MultiPolygon(mp) = geometry else {
            panic!("expected a multipolygon");
        };
        let corner = mp.0[0].exterior().0[0];
        assert!((-74.1..-73.8).contains(&corner.x), "longitude {}", corner.x);
        assert!((40.6..40.9).contains(&corner.y), "latitude {}", corner.y);

        let other = collection.features[1].properties.as_ref().unwrap();
        assert_eq!(other["taxi_usage"], "high");
        assert_eq!(other["ratio"], 1.5);
    }

    #[test]
    fn writes_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("zones.csv");
        write_csv(&path, &zones()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "zone_id,zone_name,visitors,passengers,ratio,taxi_usage",
                "7,Astoria,10,,,",
                "68,,4,6,1.5,high",
            ]
        );
    }

    #[test]
    fn writes_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.geojson");
        write_geojson(&path, &zones(), Crs::NY_LONG_ISLAND).unwrap();

        let parsed: geojson::GeoJson = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        let geojson::GeoJson::FeatureCollection(collection) = parsed else {
            panic!("expected a feature collection");
        };
        assert_eq!(collection.features.len(), 2);
    }
}
