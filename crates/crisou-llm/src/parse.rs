//! Model reply parsing into [`ModelReply`].
//!
//! Narrative-only requests (scenario, recap, chat) take the reply text as
//! is. Decision replies are expected to be a JSON object:
//!
//! ```json
//! {"narrative": "...", "resources": {"water": -2}, "status": {"morale": 5},
//!  "household": {"Ana": "injured"}}
//! ```
//!
//! Recovery strategies are tried in order:
//! 1. Direct `serde_json` deserialization
//! 2. Extract JSON from markdown code blocks
//! 3. Strip trailing commas and retry
//! 4. Extract from a code block, then strip commas
//! 5. The span from the first `{` to the last `}`, then strip commas
//! 6. The line protocol (`NEXT_SITUATION_DESCRIPTION:` / `JSON_MODIFICATIONS:`)
//!
//! Anything past strategy 5 is reported as [`ModelReply::Malformed`].

use std::collections::BTreeMap;

use crisou_types::{ModelReply, ModelRequest, RawDelta};
use serde_json::Value;
use tracing::{debug, warn};

const SITUATION_MARKER: &str = "NEXT_SITUATION_DESCRIPTION:";
const MODIFICATIONS_MARKER: &str = "JSON_MODIFICATIONS:";

/// Keys accepted for the narrative field, in priority order.
const NARRATIVE_KEYS: [&str; 4] = ["narrative", "outcome", "next_situation", "situation"];

/// Turn raw reply text into a tagged reply for the given request.
pub fn parse_reply(request: &ModelRequest, raw: &str) -> ModelReply {
    match request {
        ModelRequest::Decision(_) => parse_decision_reply(raw),
        ModelRequest::Scenario(_) | ModelRequest::Recap(_) | ModelRequest::Chat(_) => {
            parse_narrative_reply(raw)
        }
    }
}

/// A narrative-only reply. JSON wrappers with a narrative field are unwrapped.
pub fn parse_narrative_reply(raw: &str) -> ModelReply {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ModelReply::Malformed {
            narrative: None,
            delta: RawDelta::default(),
        };
    }
    if let Some(object) = parse_json_object(trimmed)
        && let Some(narrative) = narrative_field(&object)
    {
        return ModelReply::narrative(narrative);
    }
    ModelReply::narrative(trimmed)
}

/// A decision reply: narrative plus delta.
pub fn parse_decision_reply(raw: &str) -> ModelReply {
    let trimmed = raw.trim();

    if let Some(object) = parse_json_object(trimmed) {
        let delta = RawDelta {
            resources: object_field(&object, "resources"),
            status: object_field(&object, "status"),
            household: object_field(&object, "household"),
        };
        return match narrative_field(&object) {
            Some(narrative) => ModelReply::Complete { narrative, delta },
            None => {
                warn!("decision reply JSON has no narrative field");
                ModelReply::Malformed {
                    narrative: None,
                    delta,
                }
            }
        };
    }

    if let Some((narrative, delta)) = parse_line_protocol(trimmed) {
        debug!(
            resources = delta.resources.len(),
            status = delta.status.len(),
            household = delta.household.len(),
            "decision reply recovered from line protocol"
        );
        return ModelReply::Malformed { narrative, delta };
    }

    warn!(raw_response = trimmed, "decision reply is free text, keeping it as narrative only");
    ModelReply::Malformed {
        narrative: (!trimmed.is_empty()).then(|| trimmed.to_owned()),
        delta: RawDelta::default(),
    }
}

/// Attempt to read a JSON object through the recovery strategies.
fn parse_json_object(trimmed: &str) -> Option<serde_json::Map<String, Value>> {
    let as_object = |text: &str| match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };

    // Strategy 1: direct parse
    if let Some(map) = as_object(trimmed) {
        return Some(map);
    }

    // Strategy 2: extract from markdown code block
    let block = extract_json_from_codeblock(trimmed);
    if let Some(map) = block.and_then(as_object) {
        return Some(map);
    }

    // Strategy 3: strip trailing commas and retry
    if let Some(map) = as_object(&strip_trailing_commas(trimmed)) {
        return Some(map);
    }

    // Strategy 4: extract from code block then strip commas
    if let Some(map) = block.and_then(|inner| as_object(&strip_trailing_commas(inner))) {
        return Some(map);
    }

    // Strategy 5: outermost brace span, for prose around the object
    let span = extract_brace_span(trimmed)?;
    as_object(span).or_else(|| as_object(&strip_trailing_commas(span)))
}

/// The text from the first `{` to the last `}`, inclusive.
fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text.get(start..=end)).flatten()
}

fn narrative_field(object: &serde_json::Map<String, Value>) -> Option<String> {
    NARRATIVE_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn object_field(object: &serde_json::Map<String, Value>, key: &str) -> BTreeMap<String, Value> {
    match object.get(key) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(other) => {
            warn!(key = %key, value = %other, "delta section is not an object, ignoring it");
            BTreeMap::new()
        }
    }
}

/// Parse the `NEXT_SITUATION_DESCRIPTION` / `JSON_MODIFICATIONS` format.
///
/// Returns `None` when neither marker is present.
fn parse_line_protocol(text: &str) -> Option<(Option<String>, RawDelta)> {
    let situation_at = text.find(SITUATION_MARKER);
    let modifications_at = text.find(MODIFICATIONS_MARKER);
    if situation_at.is_none() && modifications_at.is_none() {
        return None;
    }

    let narrative = situation_at.and_then(|start| {
        let body = text.get(start.checked_add(SITUATION_MARKER.len())?..)?;
        let body = body.find(MODIFICATIONS_MARKER).map_or(body, |end| body.get(..end).unwrap_or(body));
        let body = body.trim();
        (!body.is_empty()).then(|| body.to_owned())
    });

    let mut delta = RawDelta::default();
    let lines = modifications_at
        .and_then(|start| text.get(start.checked_add(MODIFICATIONS_MARKER.len())?..))
        .unwrap_or_default();
    for line in lines.lines() {
        let Some(item) = line.trim().strip_prefix('-') else {
            continue;
        };
        apply_modification(item.trim(), &mut delta);
    }

    Some((narrative, delta))
}

/// Apply one modification line such as `decrease resources.water by 2`.
fn apply_modification(item: &str, delta: &mut RawDelta) {
    const FAMILY_PREFIX: &str = "update family member";

    if item
        .get(..FAMILY_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(FAMILY_PREFIX))
    {
        let rest = item.get(FAMILY_PREFIX.len()..).unwrap_or_default();
        if let Some((member, condition)) = split_family_update(rest) {
            delta.household.insert(member, Value::String(condition));
        } else {
            debug!(item = %item, "unreadable family member update");
        }
        return;
    }

    let lower = item.to_lowercase();
    let (sign, rest) = if let Some(rest) = lower.strip_prefix("decrease ") {
        (-1_i64, rest)
    } else if let Some(rest) = lower.strip_prefix("increase ") {
        (1_i64, rest)
    } else {
        debug!(item = %item, "ignoring unrecognised modification");
        return;
    };

    let Some((target, amount)) = rest.split_once(" by ") else {
        debug!(item = %item, "modification has no amount");
        return;
    };

    let section = match target.trim().split_once('.') {
        Some(("resources", name)) => Some((&mut delta.resources, name)),
        Some(("status", name)) => Some((&mut delta.status, name)),
        _ => None,
    };
    let Some((map, name)) = section else {
        debug!(item = %item, "modification target is neither a resource nor a status");
        return;
    };
    let name = name.trim().to_owned();

    // An unreadable amount is kept as text so delta parsing zeroes and reports it.
    let Ok(amount) = amount.trim().trim_end_matches('.').parse::<i64>() else {
        warn!(item = %item, "modification amount is not an integer");
        map.entry(name)
            .or_insert_with(|| Value::String(item.to_owned()));
        return;
    };
    let change = amount.saturating_mul(sign);

    let entry = map.entry(name).or_insert_with(|| Value::from(0_i64));
    let total = entry.as_i64().unwrap_or(0).saturating_add(change);
    *entry = Value::from(total);
}

/// Split `'Ana' to 'injured'` (quotes optional, `status` keyword optional).
fn split_family_update(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let text = text
        .strip_prefix("status ")
        .or_else(|| text.strip_prefix("Status "))
        .unwrap_or(text);
    let (member, condition) = text.rsplit_once(" to ")?;
    let clean = |s: &str| s.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_owned();
    let member = clean(member);
    let condition = clean(condition);
    (!member.is_empty() && !condition.is_empty()).then_some((member, condition))
}

/// Extract JSON from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let after_fence = |tag_start: usize, tag_len: usize| {
        let after_tag = tag_start.checked_add(tag_len).unwrap_or(tag_start);
        text.get(after_tag..)
            .and_then(|s| s.find('\n'))
            .and_then(|nl| after_tag.checked_add(nl))
            .and_then(|pos| pos.checked_add(1))
            .unwrap_or(after_tag)
    };

    let start = text
        .find("```json")
        .map(|i| after_fence(i, 7))
        .or_else(|| text.find("```").map(|i| after_fence(i, 3)))?;
    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Strip trailing commas before closing braces and brackets.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next = chars
                .iter()
                .skip(i.saturating_add(1))
                .find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}
