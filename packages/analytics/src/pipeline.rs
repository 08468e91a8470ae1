//! The visitor and taxi passenger comparison.
//!
//! Steps, each a pure function over in-memory tables:
//!
//! 1. [`join_blocks_to_zones`]: attach each block total to its zone,
//!    dropping blocks without one.
//! 2. [`sum_by_zone`]: visitors per zone.
//! 3. [`ZoneIndex::zones_intersecting`]: the attraction's drop-off zones.
//! 4. [`aggregate_passengers`]: passengers per pickup zone for trips
//!    ending in those zones.
//! 5. [`join_passengers`]: left join of passengers onto visitor zones.
//! 6. [`compute_ratios`] and [`classify_taxi_usage`].
//!
//! [`run_pipeline`] loads the inputs named by a [`RunConfig`] and runs the
//! steps in order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use attraction_analytics_models::{RunSummary, TaxiUsage, ZoneRatioRow};
use attraction_geography::{Attraction, PolygonLayer, load_layer};
use attraction_geography_models::Crs;
use attraction_spatial::{BlockZoneMap, ZoneIndex, map_blocks_to_zones};
use attraction_trips::{TripAggregate, aggregate_passengers, load_trips};
use attraction_visits::{count_visits, load_visits, restrict_to_attraction};
use attraction_visits_models::{BlockVisitCounts, BlockVisitTotal};
use geo::MultiPolygon;

use crate::progress::ProgressCallback;
use crate::{AnalyticsError, RunConfig};

/// A block total attached to its zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedBlockTotal {
    /// Block group identifier.
    pub block_id: String,
    /// Zone the block was assigned to.
    pub zone_id: String,
    /// Visitors from the block.
    pub visitors: u64,
}

/// Result of [`join_blocks_to_zones`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneJoin {
    /// Block totals with a zone.
    pub joined: Vec<ZonedBlockTotal>,
    /// Block totals whose block has no zone.
    pub unassigned: Vec<BlockVisitTotal>,
}

/// One zone in the final comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneComparison {
    /// Taxi zone identifier.
    pub zone_id: String,
    /// Taxi zone name.
    pub zone_name: Option<String>,
    /// Zone polygon in the run's working reference system.
    pub geometry: MultiPolygon<f64>,
    /// Visitors whose home block maps to this zone.
    pub visitors: u64,
    /// Passengers picked up here and dropped off at the attraction.
    pub passengers: Option<u64>,
    /// `passengers / visitors`.
    pub ratio: Option<f64>,
    /// Tercile of `ratio` among zones with a defined ratio.
    pub taxi_usage: Option<TaxiUsage>,
}

impl ZoneComparison {
    /// The row without geometry.
    #[must_use]
    pub fn to_row(&self) -> ZoneRatioRow {
        ZoneRatioRow {
            zone_id: self.zone_id.clone(),
            zone_name: self.zone_name.clone(),
            visitors: self.visitors,
            passengers: self.passengers,
            ratio: self.ratio,
            taxi_usage: self.taxi_usage,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Per-zone comparison ordered by zone identifier.
    pub comparisons: Vec<ZoneComparison>,
    /// Block group to zone assignments.
    pub block_zones: BlockZoneMap,
    /// Totals and data-quality counts.
    pub summary: RunSummary,
    /// Reference system of every geometry in `comparisons`.
    pub crs: Crs,
}

/// Attaches every block total to its zone. Blocks without a zone are
/// returned separately and take no further part.
#[must_use]
pub fn join_blocks_to_zones(totals: &[BlockVisitTotal], block_zones: &BlockZoneMap) -> ZoneJoin {
    let mut join = ZoneJoin::default();
    for total in totals {
        match block_zones.zone_of(&total.block_id) {
            Some(zone_id) => join.joined.push(ZonedBlockTotal {
                block_id: total.block_id.clone(),
                zone_id: zone_id.to_string(),
                visitors: total.visitors,
            }),
            None => join.unassigned.push(total.clone()),
        }
    }
    join
}

/// Visitors per zone.
#[must_use]
pub fn sum_by_zone(joined: &[ZonedBlockTotal]) -> BTreeMap<String, u64> {
    let mut visitors: BTreeMap<String, u64> = BTreeMap::new();
    for row in joined {
        let total = visitors.entry(row.zone_id.clone()).or_default();
        *total = total.saturating_add(row.visitors);
    }
    visitors
}

/// Left join of pickup passengers onto the visitor zones. Zones with no
/// matching pickups keep `passengers = None`. Ratios are not yet set.
#[must_use]
pub fn join_passengers(
    visitors: &BTreeMap<String, u64>,
    trips: &TripAggregate,
    zones: &PolygonLayer,
) -> Vec<ZoneComparison> {
    visitors
        .iter()
        .map(|(zone_id, &visitors)| {
            let feature = zones.get(zone_id);
            ZoneComparison {
                zone_id: zone_id.clone(),
                zone_name: feature.and_then(|f| f.name.clone()),
                geometry: feature.map(|f| f.geometry.clone()).unwrap_or_else(|| MultiPolygon(vec![])),
                visitors,
                passengers: trips.passengers(zone_id),
                ratio: None,
                taxi_usage: None,
            }
        })
        .collect()
}

/// `passengers / visitors`, undefined when either side is missing or
/// visitors are zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(passengers: Option<u64>, visitors: u64) -> Option<f64> {
    let passengers = passengers?;
    (visitors > 0).then(|| passengers as f64 / visitors as f64)
}

/// Sets the ratio of every row.
#[must_use]
pub fn compute_ratios(rows: Vec<ZoneComparison>) -> Vec<ZoneComparison> {
    rows.into_iter()
        .map(|row| ZoneComparison {
            ratio: ratio(row.passengers, row.visitors),
            ..row
        })
        .collect()
}

/// Assigns each defined ratio to the low, middle, or top third of all
/// defined ratios in `rows`.
#[must_use]
pub fn classify_taxi_usage(rows: Vec<ZoneComparison>) -> Vec<ZoneComparison> {
    let mut ratios: Vec<f64> = rows.iter().filter_map(|r| r.ratio).collect();
    if ratios.is_empty() {
        return rows;
    }
    ratios.sort_by(f64::total_cmp);
    let low_cut = quantile(&ratios, 1.0 / 3.0);
    let high_cut = quantile(&ratios, 2.0 / 3.0);

    rows.into_iter()
        .map(|row| ZoneComparison {
            taxi_usage: row.ratio.map(|r| TaxiUsage::from_ratio(r, low_cut, high_cut)),
            ..row
        })
        .collect()
}

/// Linear-interpolated quantile of a sorted, non-empty slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - position.floor();
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Mean of the defined ratios.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_ratio(rows: &[ZoneComparison]) -> Option<f64> {
    let ratios: Vec<f64> = rows.iter().filter_map(|r| r.ratio).collect();
    (!ratios.is_empty()).then(|| ratios.iter().sum::<f64>() / ratios.len() as f64)
}

/// The polygon layers of a run, all in one reference system, with the
/// zone index and block assignments built.
pub struct Geography {
    /// Taxi zones.
    pub zones: PolygonLayer,
    /// Census block groups.
    pub blocks: PolygonLayer,
    /// The attraction polygon.
    pub attraction: Attraction,
    /// R-tree over `zones`.
    pub index: ZoneIndex,
    /// Block group to zone assignments.
    pub block_zones: BlockZoneMap,
}

impl Geography {
    /// Reference system shared by every layer.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.zones.crs()
    }
}

/// Loads the three polygon layers, reprojects them into the working
/// reference system, and assigns blocks to zones.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if a layer cannot be loaded or reprojected.
pub fn load_geography(config: &RunConfig) -> Result<Geography, AnalyticsError> {
    let zones = load_layer("taxi zones", &config.zones)?;
    let working_crs = config.working_crs.unwrap_or_else(|| zones.crs());
    let zones = zones.reproject(working_crs)?;
    let blocks = load_layer("census block groups", &config.blocks)?.reproject(working_crs)?;
    let attraction = Attraction::load(&config.attraction)?.reproject(working_crs)?;
    log::info!("Comparing all layers in {working_crs}");

    let index = ZoneIndex::build(&zones);
    let block_zones = map_blocks_to_zones(&blocks, &index, config.assignment)?;

    Ok(Geography {
        zones,
        blocks,
        attraction,
        index,
        block_zones,
    })
}

const STEPS: u64 = 5;

/// Runs the whole comparison described by `config`.
///
/// Input paths in `config` must already be resolved.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if any input cannot be loaded.
pub fn run_pipeline(
    config: &RunConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PipelineOutput, AnalyticsError> {
    progress.set_total(STEPS);

    progress.set_message("Loading polygon layers".to_string());
    let geography = load_geography(config)?;
    progress.inc(1);

    progress.set_message("Counting visitors".to_string());
    let visits = load_visits(&config.visits)?;
    let in_attraction = restrict_to_attraction(visits, &geography.attraction)?;
    let counts = count_visits(&in_attraction, &geography.blocks.ids());
    progress.inc(1);

    progress.set_message("Summing visitors per zone".to_string());
    let join = join_blocks_to_zones(&counts.totals, &geography.block_zones);
    let visitors = sum_by_zone(&join.joined);
    progress.inc(1);

    progress.set_message("Aggregating taxi trips".to_string());
    let dropoff_zones = geography.index.zones_intersecting(&geography.attraction)?;
    log::info!(
        "Attraction intersects {} taxi zones: {}",
        dropoff_zones.len(),
        dropoff_zones.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    let trips = load_trips(&config.trips)?;
    let trip_totals = aggregate_passengers(&trips, &dropoff_zones);
    progress.inc(1);

    progress.set_message("Computing ratios".to_string());
    let comparisons = classify_taxi_usage(compute_ratios(join_passengers(
        &visitors,
        &trip_totals,
        &geography.zones,
    )));
    progress.inc(1);

    let summary = summarize(
        config,
        &SummaryInputs {
            dropoff_zones: &dropoff_zones,
            points_in_attraction: in_attraction.len(),
            block_zones: &geography.block_zones,
            counts: &counts,
            join: &join,
            trips: &trip_totals,
            comparisons: &comparisons,
        },
    );
    progress.finish(format!(
        "{}: {} zones, {} visitors, {} passengers",
        summary.name, summary.zones, summary.total_visitors, summary.total_passengers
    ));

    let crs = geography.crs();
    Ok(PipelineOutput {
        comparisons,
        block_zones: geography.block_zones,
        summary,
        crs,
    })
}

struct SummaryInputs<'a> {
    dropoff_zones: &'a BTreeSet<String>,
    points_in_attraction: usize,
    block_zones: &'a BlockZoneMap,
    counts: &'a BlockVisitCounts,
    join: &'a ZoneJoin,
    trips: &'a TripAggregate,
    comparisons: &'a [ZoneComparison],
}

fn summarize(config: &RunConfig, inputs: &SummaryInputs<'_>) -> RunSummary {
    let comparisons = inputs.comparisons;
    RunSummary {
        name: config.name.clone(),
        attraction_zones: inputs.dropoff_zones.iter().cloned().collect(),
        points_in_attraction: inputs.points_in_attraction as u64,
        blocks_assigned: inputs.block_zones.len() as u64,
        blocks_unassigned: inputs.block_zones.unassigned().len() as u64,
        suppressed_entries: inputs.counts.stats.suppressed,
        malformed_entries: inputs.counts.stats.malformed,
        unparseable_records: inputs.counts.stats.unparseable_records,
        visitors_unassigned: inputs.join.unassigned.iter().map(|t| t.visitors).sum(),
        zones: comparisons.len() as u64,
        zones_with_passengers: comparisons.iter().filter(|c| c.passengers.is_some()).count() as u64,
        total_visitors: comparisons.iter().map(|c| c.visitors).sum(),
        total_passengers: comparisons.iter().filter_map(|c| c.passengers).sum(),
        trips_matched: inputs.trips.trips_matched,
        mean_ratio: mean_ratio(comparisons),
    }
}
