//! Census GEOID helpers for New York City.
//!
//! Census block group GEOIDs are 12 digits: state FIPS (2) + county FIPS
//! (3) + tract (6) + block group (1). The five NYC boroughs are five
//! New York State counties.

/// County GEOIDs (state + county FIPS) of the five NYC boroughs.
pub const NYC_COUNTY_GEOIDS: &[&str] = &["36005", "36047", "36061", "36081", "36085"];

/// Maps an NYC county GEOID to its borough name.
///
/// Returns `None` for counties outside the city.
#[must_use]
pub fn borough_name(county_geoid: &str) -> Option<&'static str> {
    match county_geoid {
        "36005" => Some("Bronx"),
        "36047" => Some("Brooklyn"),
        "36061" => Some("Manhattan"),
        "36081" => Some("Queens"),
        "36085" => Some("Staten Island"),
        _ => None,
    }
}

/// Derive the county GEOID from a tract or block group GEOID (first 5
/// characters).
#[must_use]
pub fn derive_county_geoid(geoid: &str) -> Option<&str> {
    geoid.get(..5)
}

/// Whether a block group GEOID lies in one of the five boroughs.
#[must_use]
pub fn is_nyc_geoid(geoid: &str) -> bool {
    derive_county_geoid(geoid).is_some_and(|county| NYC_COUNTY_GEOIDS.contains(&county))
}
