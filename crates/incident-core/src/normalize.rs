use serde_json::{Map, Value};

use crate::date::parse_incident_date;
use crate::model::{
    ExternalRecord, Incident, Unit, PROP_APPROXIMATE_TIME, PROP_DATE, PROP_ESTIMATED_VALUE,
    PROP_LOCATION, PROP_NOTES, PROP_RESIDENT_NAME, PROP_TITLE, PROP_TYPE, PROP_UNIT,
    UNKNOWN_RESIDENT,
};

// Tried in order when a property object carries no `type` tag.
const PROPERTY_KINDS: [&str; 7] =
    ["title", "rich_text", "select", "status", "number", "date", "formula"];

/// Map one external property bag onto an [`Incident`].
///
/// Each property may be a Notion-typed object (`{"type": "select", "select":
/// {"name": ...}}`), a bare scalar, or missing. Unusable values fall back to
/// defaults; this never fails.
#[must_use]
pub fn normalize(raw: &ExternalRecord) -> Incident {
    let occurred_at = text(raw.get(PROP_DATE)).unwrap_or_default();
    let occurred_at_parsed = parse_incident_date(&occurred_at);

    Incident {
        title: text(raw.get(PROP_TITLE)).unwrap_or_default(),
        occurred_at,
        occurred_at_parsed,
        incident_type: text(raw.get(PROP_TYPE)).unwrap_or_default(),
        location: text(raw.get(PROP_LOCATION)),
        unit: unit(raw.get(PROP_UNIT)),
        resident_name: text(raw.get(PROP_RESIDENT_NAME))
            .unwrap_or_else(|| UNKNOWN_RESIDENT.to_string()),
        notes: text(raw.get(PROP_NOTES)),
        estimated_value: number(raw.get(PROP_ESTIMATED_VALUE)),
        approximate_time: text(raw.get(PROP_APPROXIMATE_TIME)),
    }
}

/// Normalize a Notion page object by its `properties` bag.
#[must_use]
pub fn normalize_page(page: &Value) -> Incident {
    match page.get("properties").and_then(Value::as_object) {
        Some(properties) => normalize(properties),
        None => normalize(&Map::new()),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(segments) => join_segments(segments),
        Value::Object(property) => property_text(property)?,
    };
    (!text.is_empty()).then_some(text)
}

fn property_text(property: &Map<String, Value>) -> Option<String> {
    match property.get("type").and_then(Value::as_str) {
        Some(kind) => typed_text(kind, property.get(kind)?),
        None => PROPERTY_KINDS
            .iter()
            .find_map(|kind| property.get(*kind).and_then(|inner| typed_text(kind, inner))),
    }
}

fn typed_text(kind: &str, value: &Value) -> Option<String> {
    match (kind, value) {
        ("title" | "rich_text", Value::Array(segments)) => Some(join_segments(segments)),
        ("select" | "status", Value::Object(option)) => {
            option.get("name").and_then(Value::as_str).map(str::to_owned)
        }
        ("number", Value::Number(number)) => Some(number.to_string()),
        ("date", Value::Object(range)) => {
            range.get("start").and_then(Value::as_str).map(str::to_owned)
        }
        ("formula", Value::Object(formula)) => {
            let inner = formula.get("type").and_then(Value::as_str)?;
            match formula.get(inner)? {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

fn join_segments(segments: &[Value]) -> String {
    segments
        .iter()
        .filter_map(|segment| {
            segment.get("plain_text").and_then(Value::as_str).or_else(|| {
                segment.get("text").and_then(|text| text.get("content")).and_then(Value::as_str)
            })
        })
        .collect()
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        other => text(Some(other)).and_then(|text| parse_loose_number(&text)),
    };
    parsed.filter(|number| number.is_finite())
}

fn parse_loose_number(text: &str) -> Option<f64> {
    let cleaned: String =
        text.trim().trim_start_matches('$').chars().filter(|ch| *ch != ',').collect();
    cleaned.parse().ok()
}

fn unit(value: Option<&Value>) -> Option<Unit> {
    let value = value?;
    if let Value::Number(number) = value {
        return Some(Unit::Number(number.clone()));
    }
    if let Some(Value::Number(number)) = value.get("number") {
        return Some(Unit::Number(number.clone()));
    }
    text(Some(value)).map(Unit::Text)
}
