//! Plain-text tables printed at the end of a command.

use std::collections::BTreeSet;

use attraction_analytics::ZoneComparison;
use attraction_analytics_models::RunSummary;
use attraction_geography::PolygonLayer;

pub fn print_attraction_zones(zones: &PolygonLayer, zone_ids: &BTreeSet<String>) {
    println!("{:<8} NAME", "ZONE");
    println!("{}", "-".repeat(40));
    for id in zone_ids {
        let name = zones
            .get(id)
            .and_then(|f| f.name.as_deref())
            .unwrap_or_default();
        println!("{id:<8} {name}");
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn print_comparison(comparisons: &[ZoneComparison]) {
    println!(
        "{:<8} {:<32} {:>10} {:>12} {:>10} USAGE",
        "ZONE", "NAME", "VISITORS", "PASSENGERS", "RATIO"
    );
    println!("{}", "-".repeat(86));
    for zone in comparisons {
        println!(
            "{:<8} {:<32} {:>10} {:>12} {:>10} {}",
            zone.zone_id,
            zone.zone_name.as_deref().unwrap_or_default(),
            zone.visitors,
            or_dash(zone.passengers),
            or_dash(zone.ratio.map(|r| format!("{r:.3}"))),
            or_dash(zone.taxi_usage),
        );
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run:                    {}", summary.name);
    println!("Attraction zones:       {}", summary.attraction_zones.join(", "));
    println!("POIs in attraction:     {}", summary.points_in_attraction);
    println!(
        "Block groups:           {} assigned, {} unassigned",
        summary.blocks_assigned, summary.blocks_unassigned
    );
    println!(
        "Origin entries skipped: {} suppressed, {} malformed ({} unparseable records)",
        summary.suppressed_entries, summary.malformed_entries, summary.unparseable_records
    );
    println!("Visitors without zone:  {}", summary.visitors_unassigned);
    println!(
        "Zones compared:         {} ({} with taxi pickups)",
        summary.zones, summary.zones_with_passengers
    );
    println!("Total visitors:         {}", summary.total_visitors);
    println!(
        "Total passengers:       {} ({} matching trips)",
        summary.total_passengers, summary.trips_matched
    );
    println!(
        "Mean taxi ratio:        {}",
        or_dash(summary.mean_ratio.map(|r| format!("{r:.3}")))
    );
}
