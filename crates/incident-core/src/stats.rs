use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Incident;

/// Counts shown next to the timeline. Per-facet counts are taken over the
/// full record set, not the filtered subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub filtered: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_resident: BTreeMap<String, usize>,
    pub by_location: BTreeMap<String, usize>,
}

impl Stats {
    #[must_use]
    pub fn collect(incidents: &[Incident], filtered: usize) -> Self {
        let mut stats = Self { total: incidents.len(), filtered, ..Self::default() };
        for incident in incidents {
            bump(&mut stats.by_type, incident.incident_type());
            bump(&mut stats.by_resident, incident.resident_name());
            if let Some(location) = incident.location() {
                bump(&mut stats.by_location, location);
            }
        }
        stats
    }

    #[must_use]
    pub fn type_count(&self, name: &str) -> usize {
        self.by_type.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn resident_count(&self, name: &str) -> usize {
        self.by_resident.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn location_count(&self, name: &str) -> usize {
        self.by_location.get(name).copied().unwrap_or(0)
    }
}

fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    if key.is_empty() {
        return;
    }
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sample_incidents;

    #[test]
    fn counts_cover_the_full_set() {
        let incidents = sample_incidents();
        let stats = Stats::collect(&incidents, 1);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.type_count("Vandalism"), 2);
        assert_eq!(stats.type_count("Theft"), 1);
        assert_eq!(stats.type_count("Trespass"), 0);
        assert_eq!(stats.resident_count("Amna Akbar"), 2);
        assert_eq!(stats.resident_count("Unknown"), 1);
        assert_eq!(stats.location_count("Garage"), 1);
    }

    #[test]
    fn empty_values_are_not_counted() {
        let incidents: Vec<Incident> = match serde_json::from_str(r#"[{"Incident": "bare"}]"#) {
            Ok(incidents) => incidents,
            Err(err) => panic!("fixture should deserialize: {err}"),
        };
        let stats = Stats::collect(&incidents, 1);
        assert!(stats.by_type.is_empty());
        assert!(stats.by_location.is_empty());
        assert_eq!(stats.resident_count("Unknown"), 1);
    }
}
