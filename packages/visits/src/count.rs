//! Origin mapping parsing and per-block visit counting.
//!
//! Each point of interest lists visitors by home block group as a JSON
//! object. Values are usually integers, but the publisher replaces small
//! counts with placeholder text (`"<4"` and similar). Those entries are
//! tallied as suppressed and contribute nothing; they are never read as
//! zero.

use std::collections::{BTreeMap, BTreeSet};

use attraction_visits_models::{BlockVisitCounts, BlockVisitTotal, CountStats, VisitCount, VisitRecord};
use serde_json::Value;

/// Placeholder words meaning "below the reporting threshold".
const SUPPRESSED_WORDS: &[&str] = &["*", "suppressed", "n/a", "na", "redacted"];

/// Classifies one origin count value.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_visit_count(value: &Value) -> VisitCount {
    match value {
        Value::Number(n) => n.as_u64().map_or_else(
            || {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < 1.8e19)
                    .map_or(VisitCount::Malformed, |f| VisitCount::Numeric(f as u64))
            },
            VisitCount::Numeric,
        ),
        Value::String(s) => parse_visit_token(s),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => VisitCount::Malformed,
    }
}

fn parse_visit_token(token: &str) -> VisitCount {
    let token = token.trim();
    if let Ok(n) = token.parse::<u64>() {
        return VisitCount::Numeric(n);
    }
    if is_suppressed(token) {
        VisitCount::Suppressed
    } else {
        VisitCount::Malformed
    }
}

/// `<4`, `<=4`, `≤4`, and the placeholder words.
fn is_suppressed(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    if SUPPRESSED_WORDS.contains(&lower.as_str()) {
        return true;
    }
    let threshold = lower
        .strip_prefix("<=")
        .or_else(|| lower.strip_prefix('<'))
        .or_else(|| lower.strip_prefix('≤'));
    threshold.is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Parses an origin mapping (`{"<block id>": <count>, ...}`).
///
/// Blank text is an empty mapping. Returns `None` when the text is not a
/// JSON object.
#[must_use]
pub fn parse_origin_counts(text: &str) -> Option<BTreeMap<String, VisitCount>> {
    let text = text.trim();
    if text.is_empty() {
        return Some(BTreeMap::new());
    }
    let object: serde_json::Map<String, Value> = serde_json::from_str(text).ok()?;
    Some(
        object
            .iter()
            .map(|(block, value)| (block.trim().to_string(), parse_visit_count(value)))
            .collect(),
    )
}

/// Sums numeric visitor counts per origin block group.
///
/// Only blocks in `valid_blocks` are counted; numeric counts for any other
/// block are tallied as `unknown_block`. Records whose mapping cannot be
/// parsed contribute nothing and are tallied as `unparseable_records`.
#[must_use]
pub fn count_visits(records: &[VisitRecord], valid_blocks: &BTreeSet<String>) -> BlockVisitCounts {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    let mut stats = CountStats::default();

    for record in records {
        stats.records += 1;
        let Some(origins) = parse_origin_counts(&record.visitor_home_cbgs) else {
            log::debug!(
                "Unparseable visitor_home_cbgs for {}",
                record.location_name
            );
            stats.unparseable_records += 1;
            continue;
        };

        for (block, count) in origins {
            match count {
                VisitCount::Numeric(n) => {
                    if valid_blocks.contains(&block) {
                        stats.numeric += 1;
                        let total = totals.entry(block).or_default();
                        *total = total.saturating_add(n);
                    } else {
                        stats.unknown_block += 1;
                    }
                }
                VisitCount::Suppressed => stats.suppressed += 1,
                VisitCount::Malformed => stats.malformed += 1,
            }
        }
    }

    log::info!(
        "Counted visitors for {} block groups ({} numeric, {} suppressed, {} malformed, {} outside the block layer, {} unparseable records)",
        totals.len(),
        stats.numeric,
        stats.suppressed,
        stats.malformed,
        stats.unknown_block,
        stats.unparseable_records
    );

    BlockVisitCounts {
        totals: totals
            .into_iter()
            .map(|(block_id, visitors)| BlockVisitTotal { block_id, visitors })
            .collect(),
        stats,
    }
}
