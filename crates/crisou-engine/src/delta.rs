//! Defensive conversion of model-proposed deltas into numeric changes.
//!
//! The language model's delta is untrusted. Parsing never fails as a whole:
//!
//! - keys that are not in the resource/status catalogue are ignored
//! - values that are not numbers (or numeric strings) become a zero change
//!   and are reported in [`ParsedDelta::repaired`]
//! - household updates for unknown members or with empty text are ignored
//!
//! One bad field therefore never discards an otherwise valid day.

use std::collections::BTreeMap;

use crisou_types::RawDelta;
use tracing::{debug, warn};

use crate::config::EngineConfig;

/// A delta reduced to catalogue keys and integer changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDelta {
    /// Resource name to signed change.
    pub resources: BTreeMap<String, i64>,
    /// Status category to signed change.
    pub status: BTreeMap<String, i64>,
    /// Household member name to new condition.
    pub household: BTreeMap<String, String>,
    /// Keys whose values could not be read and were treated as zero.
    pub repaired: Vec<String>,
}

/// Reduce a raw delta to the changes the engine can apply.
///
/// `members` is the current household status map; household updates are
/// matched against its keys case-insensitively.
pub fn parse_delta(
    raw: &RawDelta,
    config: &EngineConfig,
    members: &BTreeMap<String, String>,
) -> ParsedDelta {
    let mut parsed = ParsedDelta::default();

    for (key, value) in &raw.resources {
        let name = canonical_key(key);
        if !config.resources.contains_key(&name) {
            debug!(key = %key, "ignoring unknown resource in delta");
            continue;
        }
        let change = coerce_change(value).unwrap_or_else(|| {
            warn!(key = %key, value = %value, "unreadable resource change, treating as zero");
            parsed.repaired.push(format!("resources.{name}"));
            0
        });
        accumulate(&mut parsed.resources, name, change);
    }

    for (key, value) in &raw.status {
        let name = canonical_key(key);
        if !config.status.contains_key(&name) {
            debug!(key = %key, "ignoring unknown status in delta");
            continue;
        }
        let change = coerce_change(value).unwrap_or_else(|| {
            warn!(key = %key, value = %value, "unreadable status change, treating as zero");
            parsed.repaired.push(format!("status.{name}"));
            0
        });
        accumulate(&mut parsed.status, name, change);
    }

    for (key, value) in &raw.household {
        let Some(member) = members
            .keys()
            .find(|m| m.eq_ignore_ascii_case(key.trim()))
        else {
            debug!(key = %key, "ignoring household update for unknown member");
            continue;
        };
        let condition = value.as_str().map(str::trim).unwrap_or_default();
        if condition.is_empty() {
            debug!(key = %key, "ignoring empty household condition");
            continue;
        }
        parsed
            .household
            .insert(member.clone(), condition.to_owned());
    }

    parsed
}

/// Canonical catalogue key: trimmed, lower-case, spaces and hyphens as underscores.
pub fn canonical_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Read a signed integer change from a JSON value.
///
/// Integers are used as-is, finite floats are rounded (saturating at the
/// `i64` range so huge values still clamp), and numeric strings (optionally
/// with a leading `+`) are parsed. Everything else is `None`.
pub fn coerce_change(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(round_float)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            let s = s.strip_prefix('+').unwrap_or(s);
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(round_float))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn round_float(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let rounded = f.round();
    if rounded <= i64::MIN as f64 {
        return Some(i64::MIN);
    }
    if rounded >= i64::MAX as f64 {
        return Some(i64::MAX);
    }
    Some(rounded as i64)
}

fn accumulate(map: &mut BTreeMap<String, i64>, name: String, change: i64) {
    let entry = map.entry(name).or_insert(0);
    *entry = entry.saturating_add(change);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(resources: serde_json::Value, status: serde_json::Value) -> RawDelta {
        serde_json::from_value(json!({"resources": resources, "status": status}))
            .unwrap_or_default()
    }

    #[test]
    fn numeric_fields_are_kept() {
        let config = EngineConfig::default();
        let parsed = parse_delta(
            &raw(json!({"water": -3, "food": 2}), json!({"morale": -10})),
            &config,
            &BTreeMap::new(),
        );
        assert_eq!(parsed.resources.get("water"), Some(&-3));
        assert_eq!(parsed.resources.get("food"), Some(&2));
        assert_eq!(parsed.status.get("morale"), Some(&-10));
        assert!(parsed.repaired.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = EngineConfig::default();
        let parsed = parse_delta(
            &raw(json!({"gold": 5}), json!({"luck": 3})),
            &config,
            &BTreeMap::new(),
        );
        assert!(parsed.resources.is_empty());
        assert!(parsed.status.is_empty());
        assert!(parsed.repaired.is_empty());
    }

    #[test]
    fn malformed_field_becomes_zero_others_survive() {
        let config = EngineConfig::default();
        let parsed = parse_delta(
            &raw(json!({"water": "a lot", "food": -4}), json!({"health": null})),
            &config,
            &BTreeMap::new(),
        );
        assert_eq!(parsed.resources.get("water"), Some(&0));
        assert_eq!(parsed.resources.get("food"), Some(&-4));
        assert_eq!(parsed.status.get("health"), Some(&0));
        assert_eq!(parsed.repaired, vec!["resources.water", "status.health"]);
    }

    #[test]
    fn unreadable_modification_line_is_reported() {
        let config = EngineConfig::default();
        let parsed = parse_delta(
            &raw(
                json!({"water": "decrease resources.water by 2.5"}),
                json!({"morale": "increase status.morale by a lot"}),
            ),
            &config,
            &BTreeMap::new(),
        );
        assert_eq!(parsed.resources.get("water"), Some(&0));
        assert_eq!(parsed.status.get("morale"), Some(&0));
        assert_eq!(parsed.repaired, vec!["resources.water", "status.morale"]);
    }

    #[test]
    fn keys_are_canonicalized_and_merged() {
        let config = EngineConfig::default();
        let parsed = parse_delta(
            &raw(
                json!({"Medical Supplies": 2, "medical-supplies": 1, " WATER ": -1}),
                json!({}),
            ),
            &config,
            &BTreeMap::new(),
        );
        assert_eq!(parsed.resources.get("medical_supplies"), Some(&3));
        assert_eq!(parsed.resources.get("water"), Some(&-1));
    }

    #[test]
    fn household_updates_match_known_members() {
        let config = EngineConfig::default();
        let members = BTreeMap::from([("Jules".to_owned(), "safe".to_owned())]);
        let delta: RawDelta = serde_json::from_value(json!({
            "household": {"jules": " injured ", "Nobody": "lost", "JULES ": ""}
        }))
        .unwrap_or_default();
        let parsed = parse_delta(&delta, &config, &members);
        assert_eq!(parsed.household.len(), 1);
        assert_eq!(parsed.household.get("Jules").map(String::as_str), Some("injured"));
    }

    #[test]
    fn coerce_change_variants() {
        assert_eq!(coerce_change(&json!(-7)), Some(-7));
        assert_eq!(coerce_change(&json!(2.6)), Some(3));
        assert_eq!(coerce_change(&json!("-4")), Some(-4));
        assert_eq!(coerce_change(&json!("+5")), Some(5));
        assert_eq!(coerce_change(&json!(" 1.4 ")), Some(1));
        assert_eq!(coerce_change(&json!("five")), None);
        assert_eq!(coerce_change(&json!(true)), None);
        assert_eq!(coerce_change(&json!(null)), None);
        assert_eq!(coerce_change(&json!([1])), None);
        assert_eq!(coerce_change(&json!(1e300)), Some(i64::MAX));
        assert_eq!(coerce_change(&json!("-1e300")), Some(i64::MIN));
        assert_eq!(coerce_change(&json!("NaN")), None);
    }

    #[test]
    fn canonical_key_forms() {
        assert_eq!(canonical_key("Medical Supplies"), "medical_supplies");
        assert_eq!(canonical_key("medical-supplies"), "medical_supplies");
        assert_eq!(canonical_key("  water "), "water");
    }
}
