//! Reads polygon layers from shapefiles and `GeoJSON`.
//!
//! Both formats are reduced to the same raw shape: a reference system plus
//! a list of multipolygons with the requested property values stringified.
//! Numeric identifiers are normalized to integer text so that `12`, `12.0`
//! and `"12"` all key the same zone.

use std::path::{Path, PathBuf};

use attraction_geography_models::{Crs, LayerSource};
use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};

use crate::crs::{detect_crs_name, detect_prj_crs};
use crate::{GeographyError, LayerFeature, PolygonLayer};

/// A polygon feature with the requested properties, before keying.
pub(crate) struct RawFeature {
    /// Values of the requested fields, aligned with the `fields` argument.
    pub values: Vec<Option<String>>,
    pub geometry: MultiPolygon<f64>,
}

/// Loads and keys a polygon layer.
///
/// Features without an identifier or without polygon geometry are skipped
/// with a warning. When `source.id_prefixes` is non-empty only features
/// whose identifier starts with one of the prefixes are kept.
///
/// # Errors
///
/// Returns [`GeographyError`] if the file is missing or unreadable, the
/// format is unsupported, or the reference system cannot be identified.
pub fn load_layer(label: &str, source: &LayerSource) -> Result<PolygonLayer, GeographyError> {
    let mut fields = vec![source.id_field.as_str()];
    if let Some(name_field) = &source.name_field {
        fields.push(name_field.as_str());
    }

    let (crs, raw) = read_features(&source.path, &fields, source.crs)?;
    let total = raw.len();

    let mut missing_id = 0usize;
    let mut filtered = 0usize;
    let mut features = Vec::with_capacity(total);

    for feature in raw {
        let mut values = feature.values.into_iter();
        let Some(id) = values.next().flatten() else {
            missing_id += 1;
            continue;
        };
        if !source.id_prefixes.is_empty()
            && !source.id_prefixes.iter().any(|p| id.starts_with(p.as_str()))
        {
            filtered += 1;
            continue;
        }
        features.push(LayerFeature {
            id,
            name: values.next().flatten(),
            geometry: feature.geometry,
        });
    }

    if missing_id > 0 {
        log::warn!(
            "{label}: skipped {missing_id} features with no '{}' value",
            source.id_field
        );
    }
    if filtered > 0 {
        log::debug!("{label}: filtered out {filtered} features by id prefix");
    }

    let layer = PolygonLayer::new(label, crs, features);
    log::info!(
        "Loaded {} {label} features ({total} read) from {} in {crs}",
        layer.len(),
        source.path.display()
    );
    Ok(layer)
}

/// Reads raw polygon features and the file's reference system.
///
/// `crs_override` wins over anything declared by the file.
pub(crate) fn read_features(
    path: &Path,
    fields: &[&str],
    crs_override: Option<Crs>,
) -> Result<(Crs, Vec<RawFeature>), GeographyError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("shp") => read_shapefile(path, fields, crs_override),
        Some("geojson" | "json") => read_geojson(path, fields, crs_override),
        _ => Err(GeographyError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read_geojson(
    path: &Path,
    fields: &[&str],
    crs_override: Option<Crs>,
) -> Result<(Crs, Vec<RawFeature>), GeographyError> {
    let text = std::fs::read_to_string(path).map_err(|source| GeographyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson: GeoJson = text.parse().map_err(|e| GeographyError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeographyError::InvalidGeometry {
            message: format!("{} is not a FeatureCollection", path.display()),
        });
    };

    let crs = match crs_override {
        Some(crs) => crs,
        None => geojson_crs(path, collection.foreign_members.as_ref())?,
    };

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let values = fields
            .iter()
            .map(|field| feature.property(field).and_then(json_value_to_string))
            .collect();

        let Some(geometry) = feature.geometry else {
            continue;
        };
        let Some(geometry) = geo::Geometry::<f64>::try_from(geometry)
            .ok()
            .and_then(into_multi_polygon)
        else {
            log::warn!("{}: skipping non-polygon feature", path.display());
            continue;
        };

        features.push(RawFeature { values, geometry });
    }

    Ok((crs, features))
}

/// Resolves the legacy `crs` member; RFC 7946 documents without one are
/// WGS 84.
fn geojson_crs(
    path: &Path,
    foreign_members: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<Crs, GeographyError> {
    let Some(crs_member) = foreign_members.and_then(|m| m.get("crs")) else {
        return Ok(Crs::WGS84);
    };

    let name = crs_member
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();

    detect_crs_name(name).ok_or_else(|| GeographyError::UnknownCrs {
        path: path.to_path_buf(),
        detail: format!("unsupported crs member {crs_member}"),
    })
}

fn read_shapefile(
    path: &Path,
    fields: &[&str],
    crs_override: Option<Crs>,
) -> Result<(Crs, Vec<RawFeature>), GeographyError> {
    let crs = match crs_override {
        Some(crs) => crs,
        None => shapefile_crs(path)?,
    };

    let shapefile_err = |source| GeographyError::Shapefile {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = shapefile::Reader::from_path(path).map_err(shapefile_err)?;
    let mut features = Vec::new();
    let mut skipped = 0usize;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(shapefile_err)?;

        let geometry = match shape {
            Shape::Polygon(polygon) => assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
            Shape::PolygonM(polygon) => {
                assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y })
            }
            Shape::PolygonZ(polygon) => {
                assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y })
            }
            _ => {
                skipped += 1;
                continue;
            }
        };

        let values = fields
            .iter()
            .map(|field| record.get(field).and_then(field_value_to_string))
            .collect();

        features.push(RawFeature { values, geometry });
    }

    if skipped > 0 {
        log::warn!("{}: skipped {skipped} non-polygon shapes", path.display());
    }

    Ok((crs, features))
}

/// Reads the sibling `.prj` file and identifies its reference system.
fn shapefile_crs(path: &Path) -> Result<Crs, GeographyError> {
    let prj_path: PathBuf = path.with_extension("prj");
    if !prj_path.exists() {
        return Err(GeographyError::UnknownCrs {
            path: path.to_path_buf(),
            detail: "no .prj file and no crs override".to_string(),
        });
    }

    let wkt = std::fs::read_to_string(&prj_path).map_err(|source| GeographyError::Io {
        path: prj_path.clone(),
        source,
    })?;

    detect_prj_crs(&wkt).ok_or_else(|| GeographyError::UnknownCrs {
        path: path.to_path_buf(),
        detail: format!("unrecognized WKT {}", truncate_for_log(wkt.trim(), 120)),
    })
}

/// Groups shapefile rings into polygons. Each inner ring is attached to
/// the outer ring that contains its first vertex.
fn assemble_rings<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut outers: Vec<Polygon<f64>> = Vec::new();
    let mut inners: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&xy).collect();
        match ring {
            PolygonRing::Outer(_) => outers.push(Polygon::new(line, vec![])),
            PolygonRing::Inner(_) => inners.push(line),
        }
    }

    for inner in inners {
        let Some(first) = inner.0.first().copied() else {
            continue;
        };
        let owner = outers
            .iter()
            .position(|outer| outer.contains(&first))
            .or_else(|| outers.len().checked_sub(1));
        if let Some(idx) = owner {
            outers[idx].interiors_push(inner);
        }
    }

    MultiPolygon(outers)
}

/// Keeps only polygonal geometries.
pub(crate) fn into_multi_polygon(geometry: geo::Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Stringifies a `GeoJSON` property value usable as an identifier or name.
fn json_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_empty(s),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_f64().map(normalize_number)),
        _ => None,
    }
}

/// Stringifies a `dBase` field value usable as an identifier or name.
fn field_value_to_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.as_deref().and_then(non_empty),
        FieldValue::Numeric(n) => n.map(normalize_number),
        FieldValue::Float(f) => f.map(|f| normalize_number(f64::from(f))),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(normalize_number(*d)),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Formats integral floats without a fractional part (`12.0` -> `"12"`).
#[allow(clippy::cast_possible_truncation)]
fn normalize_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// Truncates a string for logging, appending "..." if it exceeds `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{truncated}...")
    }
}
