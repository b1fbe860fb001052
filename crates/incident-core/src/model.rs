use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use time::Date;

use crate::normalize::normalize;

/// One external row: property name to loosely-typed value.
pub type ExternalRecord = Map<String, Value>;

pub const PROP_TITLE: &str = "Incident";
pub const PROP_DATE: &str = "Date";
pub const PROP_TYPE: &str = "Type";
pub const PROP_LOCATION: &str = "Location";
pub const PROP_UNIT: &str = "Unit";
pub const PROP_RESIDENT_NAME: &str = "Resident Name";
pub const PROP_NOTES: &str = "Notes";
pub const PROP_ESTIMATED_VALUE: &str = "Estimated Value";
pub const PROP_APPROXIMATE_TIME: &str = "Approximate Time";

pub const UNKNOWN_RESIDENT: &str = "Unknown";
pub const OTHER_TYPE_PRIORITY: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Unit {
    Number(Number),
    Text(String),
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Incident types with dedicated ordering and presentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum KnownType {
    Theft,
    Disturbance,
    Vandalism,
    Trespass,
}

impl KnownType {
    pub const ALL: [Self; 4] = [Self::Theft, Self::Disturbance, Self::Vandalism, Self::Trespass];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Theft" => Some(Self::Theft),
            "Disturbance" => Some(Self::Disturbance),
            "Vandalism" => Some(Self::Vandalism),
            "Trespass" => Some(Self::Trespass),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Theft => "Theft",
            Self::Disturbance => "Disturbance",
            Self::Vandalism => "Vandalism",
            Self::Trespass => "Trespass",
        }
    }

    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Theft => 1,
            Self::Disturbance => 2,
            Self::Vandalism => 3,
            Self::Trespass => 4,
        }
    }

    #[must_use]
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Theft => "🚨",
            Self::Disturbance => "🔊",
            Self::Vandalism => "🔨",
            Self::Trespass => "🚷",
        }
    }

    #[must_use]
    pub fn tag_class(self) -> &'static str {
        match self {
            Self::Theft => "theft",
            Self::Disturbance => "disturbance",
            Self::Vandalism => "vandalism",
            Self::Trespass => "trespass",
        }
    }
}

/// Sort priority for a type name; unrecognized names share the lowest rank.
#[must_use]
pub fn type_priority(name: &str) -> u8 {
    KnownType::from_name(name).map_or(OTHER_TYPE_PRIORITY, KnownType::priority)
}

#[must_use]
pub fn type_emoji(name: &str) -> &'static str {
    KnownType::from_name(name).map_or("❓", KnownType::emoji)
}

#[must_use]
pub fn type_tag_class(name: &str) -> &'static str {
    KnownType::from_name(name).map_or("other", KnownType::tag_class)
}

const TITLE_EMOJI: &[(&[&str], &str)] = &[
    (&["bike"], "🚲"),
    (&["package", "amazon"], "📦"),
    (&["car", "vehicle"], "🚗"),
    (&["window", "glass"], "🪟"),
    (&["door"], "🚪"),
    (&["mail"], "📮"),
    (&["elevator"], "🛗"),
    (&["garage"], "🅿️"),
    (&["noise"], "📢"),
    (&["urine"], "💦"),
    (&["storage"], "🗄️"),
    (&["fire"], "🔥"),
    (&["alarm"], "🚨"),
];

const LOCATION_TAGS: &[(&str, &str)] = &[
    ("garage", "garage"),
    ("front entrance", "front-entrance"),
    ("elevator", "elevator"),
    ("west side", "side-entrance"),
    ("east side", "side-entrance"),
    ("alley", "alley"),
    ("stairwell", "stairwell"),
    ("courtyard", "courtyard"),
    ("mail", "mail"),
    ("sidewalk", "sidewalk"),
    ("hall", "hall"),
    ("lobby", "lobby"),
];

/// Tag class for a location, matched by keyword; first match wins.
#[must_use]
pub fn location_tag_class(location: Option<&str>) -> &'static str {
    let Some(location) = location.filter(|location| !location.is_empty()) else {
        return "none";
    };
    let location = location.to_lowercase();
    LOCATION_TAGS
        .iter()
        .find(|(keyword, _)| location.contains(keyword))
        .map_or("other", |(_, class)| *class)
}

/// A normalized incident.
///
/// Only [`normalize`] builds these, so `occurred_at_parsed` always agrees
/// with `occurred_at`. Serialized with the external property names; the
/// parsed date is derived again on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExternalRecord", into = "IncidentRow")]
pub struct Incident {
    pub(crate) title: String,
    pub(crate) occurred_at: String,
    pub(crate) occurred_at_parsed: Option<Date>,
    pub(crate) incident_type: String,
    pub(crate) location: Option<String>,
    pub(crate) unit: Option<Unit>,
    pub(crate) resident_name: String,
    pub(crate) notes: Option<String>,
    pub(crate) estimated_value: Option<f64>,
    pub(crate) approximate_time: Option<String>,
}

impl Incident {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The date as the source wrote it, for display.
    #[must_use]
    pub fn occurred_at(&self) -> &str {
        &self.occurred_at
    }

    #[must_use]
    pub fn occurred_at_parsed(&self) -> Option<Date> {
        self.occurred_at_parsed
    }

    #[must_use]
    pub fn incident_type(&self) -> &str {
        &self.incident_type
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    #[must_use]
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    #[must_use]
    pub fn resident_name(&self) -> &str {
        &self.resident_name
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    #[must_use]
    pub fn estimated_value(&self) -> Option<f64> {
        self.estimated_value
    }

    #[must_use]
    pub fn approximate_time(&self) -> Option<&str> {
        self.approximate_time.as_deref()
    }

    /// Emoji picked from keywords in the title, falling back to the type emoji.
    #[must_use]
    pub fn emoji(&self) -> &'static str {
        let title = self.title.to_lowercase();
        TITLE_EMOJI
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| title.contains(keyword)))
            .map_or_else(|| type_emoji(&self.incident_type), |(_, emoji)| *emoji)
    }
}

impl From<ExternalRecord> for Incident {
    fn from(raw: ExternalRecord) -> Self {
        normalize(&raw)
    }
}

#[derive(Debug, Clone, Serialize)]
struct IncidentRow {
    #[serde(rename = "Incident")]
    title: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Type")]
    incident_type: String,
    #[serde(rename = "Location")]
    location: Option<String>,
    #[serde(rename = "Unit")]
    unit: Option<Unit>,
    #[serde(rename = "Resident Name")]
    resident_name: String,
    #[serde(rename = "Notes")]
    notes: Option<String>,
    #[serde(rename = "Estimated Value")]
    estimated_value: Option<f64>,
    #[serde(rename = "Approximate Time", skip_serializing_if = "Option::is_none")]
    approximate_time: Option<String>,
}

impl From<Incident> for IncidentRow {
    fn from(incident: Incident) -> Self {
        Self {
            title: incident.title,
            date: incident.occurred_at,
            incident_type: incident.incident_type,
            location: incident.location,
            unit: incident.unit,
            resident_name: incident.resident_name,
            notes: incident.notes,
            estimated_value: incident.estimated_value,
            approximate_time: incident.approximate_time,
        }
    }
}
