//! Incident records and the views derived from them.
//!
//! Records arrive as loosely-typed property bags (Notion pages or already
//! flattened rows), are normalized once into [`Incident`], and are then only
//! read: filtering, facet extraction and month grouping all produce new
//! values from an immutable slice.

mod date;
mod model;
mod normalize;
mod sample;
mod stats;
mod view;

use async_trait::async_trait;

pub use date::{iso_date, iso_date_text, month_label, parse_filter_date, parse_incident_date};
pub use model::{
    location_tag_class, type_emoji, type_priority, type_tag_class, ExternalRecord, Incident,
    KnownType, Unit,
    OTHER_TYPE_PRIORITY, PROP_APPROXIMATE_TIME, PROP_DATE, PROP_ESTIMATED_VALUE, PROP_LOCATION,
    PROP_NOTES, PROP_RESIDENT_NAME, PROP_TITLE, PROP_TYPE, PROP_UNIT, UNKNOWN_RESIDENT,
};
pub use normalize::{normalize, normalize_page};
pub use sample::sample_incidents;
pub use stats::Stats;
pub use view::{
    derive_view, facets, filter_incidents, group_by_month, sort_newest_first, DateRange,
    DerivedView, FacetFilter, Facets, FilterState, MonthGroup, ALL, UNKNOWN_GROUP,
};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum FetchFailure {
    #[error("Failed to fetch incidents: missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Failed to fetch incidents: {0}")]
    Network(String),
    #[error("Failed to fetch incidents: upstream returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("Failed to fetch incidents: malformed response: {0}")]
    Malformed(String),
}

/// A place incidents can be read from.
///
/// Implementations perform at most one round-trip per call and never retry;
/// the caller decides what to do with a [`FetchFailure`].
#[async_trait]
pub trait IncidentSource: Send + Sync {
    async fn fetch_incidents(&self) -> Result<Vec<Incident>, FetchFailure>;
}

/// Source backed by an in-memory record set, used for the sample data and
/// for rows loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    incidents: Vec<Incident>,
}

impl StaticSource {
    #[must_use]
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }

    #[must_use]
    pub fn sample() -> Self {
        Self::new(sample_incidents())
    }
}

#[async_trait]
impl IncidentSource for StaticSource {
    async fn fetch_incidents(&self) -> Result<Vec<Incident>, FetchFailure> {
        Ok(self.incidents.clone())
    }
}
