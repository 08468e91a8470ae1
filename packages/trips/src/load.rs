//! Trip record readers for Parquet and CSV.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::{TripError, TripRecord};

const PICKUP: &str = "PULocationID";
const DROPOFF: &str = "DOLocationID";
const PASSENGERS: &str = "passenger_count";

/// Loads trip records, choosing the reader from the file extension
/// (`.parquet`/`.pq` or `.csv`).
///
/// Rows missing either zone identifier are skipped.
///
/// # Errors
///
/// Returns [`TripError`] if the file cannot be read, lacks a required
/// column, or has an unsupported extension.
pub fn load_trips(path: &Path) -> Result<Vec<TripRecord>, TripError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let (trips, skipped) = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        #[cfg(feature = "parquet")]
        Some("parquet" | "pq") => read_parquet(path)?,
        _ => {
            return Err(TripError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    if skipped > 0 {
        log::warn!(
            "{}: skipped {skipped} trips without pickup or drop-off zone",
            path.display()
        );
    }
    log::info!("Loaded {} trips from {}", trips.len(), path.display());

    Ok(trips)
}

#[derive(Debug, Deserialize)]
struct TripRow {
    #[serde(rename = "PULocationID", default)]
    pickup: Option<String>,
    #[serde(rename = "DOLocationID", default)]
    dropoff: Option<String>,
    #[serde(rename = "passenger_count", default)]
    passengers: Option<String>,
}

fn read_csv(path: &Path) -> Result<(Vec<TripRecord>, u64), TripError> {
    let file = File::open(path).map_err(|source| TripError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let csv_err = |source| TripError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_err)?;
    for column in [PICKUP, DROPOFF, PASSENGERS] {
        if !headers.iter().any(|h| h == column) {
            return Err(TripError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut trips = Vec::new();
    let mut skipped: u64 = 0;
    for row in reader.deserialize::<TripRow>() {
        let row = row.map_err(csv_err)?;
        let zones = row
            .pickup
            .as_deref()
            .and_then(normalize_zone)
            .zip(row.dropoff.as_deref().and_then(normalize_zone));
        let Some((pickup_zone, dropoff_zone)) = zones else {
            skipped += 1;
            continue;
        };
        trips.push(TripRecord {
            pickup_zone,
            dropoff_zone,
            passengers: row.passengers.as_deref().and_then(parse_passengers),
        });
    }

    Ok((trips, skipped))
}

#[cfg(feature = "parquet")]
fn read_parquet(path: &Path) -> Result<(Vec<TripRecord>, u64), TripError> {
    use polars::prelude::{ParquetReader, SerReader};

    let file = File::open(path).map_err(|source| TripError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|source| TripError::Parquet {
            path: path.to_path_buf(),
            source,
        })?;

    let pickups = int_column(&df, path, PICKUP)?;
    let dropoffs = int_column(&df, path, DROPOFF)?;
    let passengers = int_column(&df, path, PASSENGERS)?;

    let mut trips = Vec::with_capacity(df.height());
    let mut skipped: u64 = 0;
    for ((pickup, dropoff), count) in pickups.into_iter().zip(dropoffs).zip(passengers) {
        let (Some(pickup), Some(dropoff)) = (pickup, dropoff) else {
            skipped += 1;
            continue;
        };
        trips.push(TripRecord {
            pickup_zone: pickup.to_string(),
            dropoff_zone: dropoff.to_string(),
            passengers: count.and_then(|n| u64::try_from(n).ok()),
        });
    }

    Ok((trips, skipped))
}

/// Reads an integer-like column, casting floating point passenger counts
/// and 32-bit zone identifiers to `i64`.
#[cfg(feature = "parquet")]
fn int_column(
    df: &polars::prelude::DataFrame,
    path: &Path,
    column: &'static str,
) -> Result<Vec<Option<i64>>, TripError> {
    use polars::prelude::DataType;

    let parquet_err = |source| TripError::Parquet {
        path: path.to_path_buf(),
        source,
    };

    let series = df.column(column).map_err(|_| TripError::MissingColumn {
        path: path.to_path_buf(),
        column,
    })?;
    let cast = series.cast(&DataType::Int64).map_err(parquet_err)?;
    let values = cast.i64().map_err(parquet_err)?.into_iter().collect();
    Ok(values)
}

/// Zone identifiers arrive as `"132"` or `"132.0"`; both become `"132"`.
fn normalize_zone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{n:.0}")),
        _ => Some(raw.to_string()),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_passengers(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let n = raw.parse::<f64>().ok()?;
    (n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n < 1.8e19).then_some(n as u64)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_csv_trips() {
        let file = write_file(
            ".csv",
            "VendorID,PULocationID,DOLocationID,passenger_count,fare_amount\n\
             1,132,68,1.0,52.0\n\
             2,138,68,,30.5\n\
             1,,68,2,10.0\n\
             2,7,246.0,3,12.0\n",
        );

        let trips = load_trips(file.path()).unwrap();
        assert_eq!(
            trips,
            vec![
                TripRecord {
                    pickup_zone: "132".to_string(),
                    dropoff_zone: "68".to_string(),
                    passengers: Some(1),
                },
                TripRecord {
                    pickup_zone: "138".to_string(),
                    dropoff_zone: "68".to_string(),
                    passengers: None,
                },
                TripRecord {
                    pickup_zone: "7".to_string(),
                    dropoff_zone: "246".to_string(),
                    passengers: Some(3),
                },
            ]
        );
    }

    #[test]
    fn csv_without_required_column_fails() {
        let file = write_file(".csv", "PULocationID,DOLocationID\n1,2\n");
        let err = load_trips(file.path()).unwrap_err();
        assert!(matches!(
            err,
            TripError::MissingColumn {
                column: "passenger_count",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_file(".txt", "");
        assert!(matches!(
            load_trips(file.path()),
            Err(TripError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_trips(Path::new("/nonexistent/trips.csv")),
            Err(TripError::Io { .. })
        ));
    }

    #[test]
    fn parses_passenger_counts() {
        assert_eq!(parse_passengers("2"), Some(2));
        assert_eq!(parse_passengers("2.0"), Some(2));
        assert_eq!(parse_passengers("-1"), None);
        assert_eq!(parse_passengers("NaN"), None);
    }

    #[cfg(feature = "parquet")]
    #[test]
    fn reads_parquet_trips() {
        use polars::prelude::{NamedFrom, ParquetWriter, Series};

        let mut df = polars::prelude::DataFrame::new(vec![
            Series::new(PICKUP, &[Some(132_i32), Some(138), None]),
            Series::new(DROPOFF, &[68_i32, 68, 68]),
            Series::new(PASSENGERS, &[Some(2.0_f64), None, Some(1.0)]),
        ])
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut out = File::create(file.path()).unwrap();
        ParquetWriter::new(&mut out).finish(&mut df).unwrap();
        drop(out);

        let trips = load_trips(file.path()).unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].pickup_zone, "132");
        assert_eq!(trips[0].dropoff_zone, "68");
        assert_eq!(trips[0].passengers, Some(2));
        assert_eq!(trips[1].passengers, None);
    }
}
