use serde_json::{json, Value};

use crate::model::Incident;
use crate::normalize::normalize;

/// Built-in records shown when the live source cannot be reached.
#[must_use]
pub fn sample_incidents() -> Vec<Incident> {
    let rows = json!([
        {
            "Incident": "Patio Storage breakin attempted",
            "Date": "February 14, 2025",
            "Type": "Disturbance",
            "Location": "West Side Entrance",
            "Unit": 107,
            "Resident Name": "Amna Akbar",
            "Notes": null
        },
        {
            "Incident": "Garage Storage Tarp ripped",
            "Date": "February 14, 2025",
            "Type": "Vandalism",
            "Location": "Garage",
            "Unit": 107,
            "Resident Name": "Amna Akbar",
            "Notes": null
        },
        {
            "Incident": "Urine in elevator",
            "Date": "February 14, 2025",
            "Type": "Vandalism",
            "Location": "Elevator",
            "Unit": "Unknown",
            "Resident Name": "Unknown",
            "Notes": "Repeat Offender"
        },
        {
            "Incident": "Package theft",
            "Date": "January 15, 2025",
            "Type": "Theft",
            "Location": "Mail Room",
            "Unit": 205,
            "Resident Name": "John Smith",
            "Notes": "Amazon package",
            "Estimated Value": 49.99
        }
    ]);

    match rows {
        Value::Array(rows) => {
            rows.iter().filter_map(Value::as_object).map(normalize).collect()
        }
        _ => Vec::new(),
    }
}
