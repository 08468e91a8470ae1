//! Compile-time registry of bundled run definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a preset requires creating a TOML file in `presets/` and adding a
//! corresponding entry here.

use crate::{AnalyticsError, RunConfig};

/// Number of bundled presets. Enforced by a test.
#[cfg(test)]
const EXPECTED_PRESET_COUNT: usize = 2;

/// Embedded TOML run definitions.
const PRESET_TOMLS: &[(&str, &str)] = &[
    ("astoria", include_str!("../presets/astoria.toml")),
    ("hudson_yards", include_str!("../presets/hudson_yards.toml")),
];

/// Names of all bundled presets.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESET_TOMLS.iter().map(|(name, _)| *name)
}

/// Parses the bundled preset called `name`.
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownPreset`] if no preset has that name
/// and [`AnalyticsError::Config`] if its definition does not parse.
pub fn preset(name: &str) -> Result<RunConfig, AnalyticsError> {
    let (_, toml_str) = PRESET_TOMLS
        .iter()
        .find(|(preset_name, _)| *preset_name == name)
        .ok_or_else(|| AnalyticsError::UnknownPreset {
            name: name.to_string(),
            available: preset_names().collect::<Vec<_>>().join(", "),
        })?;
    RunConfig::from_toml_str(name, toml_str)
}

/// Parses every bundled preset.
///
/// # Errors
///
/// Returns [`AnalyticsError::Config`] if any definition does not parse.
pub fn all_presets() -> Result<Vec<RunConfig>, AnalyticsError> {
    PRESET_TOMLS
        .iter()
        .map(|(name, toml_str)| RunConfig::from_toml_str(name, toml_str))
        .collect()
}
