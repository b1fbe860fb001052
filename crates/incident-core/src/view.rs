use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::date::{iso_date, month_label};
use crate::model::{type_priority, Incident};

/// Sentinel facet value meaning "no restriction".
pub const ALL: &str = "all";
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Selection state of one facet control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacetFilter {
    #[default]
    All,
    Only(String),
}

impl FacetFilter {
    /// `"all"` and the empty string both mean no restriction.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == ALL {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL,
            Self::Only(value) => value,
        }
    }

    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => value == Some(expected.as_str()),
        }
    }
}

impl From<String> for FacetFilter {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for FacetFilter {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<FacetFilter> for String {
    fn from(filter: FacetFilter) -> Self {
        match filter {
            FacetFilter::All => ALL.to_string(),
            FacetFilter::Only(value) => value,
        }
    }
}

impl Display for FacetFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive date bounds. The range only applies when both ends are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, with = "iso_date::option")]
    pub start: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end: Option<Date>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Membership test; incidents without a parsed date fall outside an
    /// active range.
    #[must_use]
    pub fn contains(&self, date: Option<Date>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => date.is_some_and(|date| start <= date && date <= end),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(rename = "type", default)]
    pub incident_type: FacetFilter,
    #[serde(default)]
    pub resident: FacetFilter,
    #[serde(default)]
    pub location: FacetFilter,
    #[serde(default)]
    pub date_range: DateRange,
}

impl FilterState {
    #[must_use]
    pub fn matches(&self, incident: &Incident) -> bool {
        self.incident_type.matches(Some(incident.incident_type()))
            && self.resident.matches(Some(incident.resident_name()))
            && self.location.matches(incident.location())
            && self.date_range.contains(incident.occurred_at_parsed())
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.incident_type.is_all()
            && self.resident.is_all()
            && self.location.is_all()
            && !self.date_range.is_active()
    }
}

/// Distinct values for each filter control, each list led by [`ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    pub types: Vec<String>,
    pub residents: Vec<String>,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGroup {
    /// `"{year}-{month}"` with a 1-based month, or [`UNKNOWN_GROUP`].
    pub key: String,
    pub label: String,
    pub incidents: Vec<Incident>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedView {
    pub filtered: Vec<Incident>,
    pub facets: Facets,
    pub groups: Vec<MonthGroup>,
}

impl DerivedView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Compute the filtered subset, the facet lists and the month grouping.
///
/// Facets come from the full `incidents` slice, never the filtered subset, so
/// a selected value stays available in its own control.
#[must_use]
pub fn derive_view(incidents: &[Incident], filters: &FilterState) -> DerivedView {
    let filtered = filter_incidents(incidents, filters);
    let groups = group_by_month(&filtered);
    DerivedView { facets: facets(incidents), groups, filtered }
}

#[must_use]
pub fn filter_incidents(incidents: &[Incident], filters: &FilterState) -> Vec<Incident> {
    incidents.iter().filter(|incident| filters.matches(incident)).cloned().collect()
}

#[must_use]
pub fn facets(incidents: &[Incident]) -> Facets {
    let mut types = distinct_first_seen(incidents.iter().map(Incident::incident_type));
    // Stable sort: equal priorities keep first-seen order.
    types.sort_by_key(|name| type_priority(name));

    Facets {
        types: with_all(types),
        residents: with_all(distinct_sorted(incidents.iter().map(Incident::resident_name))),
        locations: with_all(distinct_sorted(incidents.iter().filter_map(Incident::location))),
    }
}

fn distinct_first_seen<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| is_facet_value(value) && seen.insert(*value))
        .map(str::to_owned)
        .collect()
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|value| is_facet_value(value))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn is_facet_value(value: &str) -> bool {
    !value.is_empty() && value != ALL
}

fn with_all(values: Vec<String>) -> Vec<String> {
    std::iter::once(ALL.to_string()).chain(values).collect()
}

/// Group incidents by calendar month, in order of each group's first member.
#[must_use]
pub fn group_by_month(incidents: &[Incident]) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for incident in incidents {
        let (key, label) = match incident.occurred_at_parsed() {
            Some(date) => {
                (format!("{}-{}", date.year(), u8::from(date.month())), month_label(date))
            }
            None => (UNKNOWN_GROUP.to_string(), UNKNOWN_GROUP.to_string()),
        };

        if let Some(&index) = index_by_key.get(&key) {
            groups[index].incidents.push(incident.clone());
        } else {
            index_by_key.insert(key.clone(), groups.len());
            groups.push(MonthGroup { key, label, incidents: vec![incident.clone()] });
        }
    }

    groups
}

/// Stable newest-first ordering; incidents without a parsed date go last.
pub fn sort_newest_first(incidents: &mut [Incident]) {
    incidents.sort_by(|left, right| right.occurred_at_parsed().cmp(&left.occurred_at_parsed()));
}
