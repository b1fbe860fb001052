use std::sync::Arc;

use async_trait::async_trait;
use incident_core::{
    derive_view, sample_incidents, sort_newest_first, DerivedView, FetchFailure, FilterState,
    Incident, IncidentSource, Stats,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;

pub const TIMELINE_PATH: &str = "/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    Live,
    Sample,
}

/// The record set held for one timeline session.
///
/// Replaced wholesale on every load; never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineLoad {
    pub origin: LoadOrigin,
    pub incidents: Vec<Incident>,
    /// Shown next to the fallback data when the live fetch failed.
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub loaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineView {
    pub filters: FilterState,
    pub view: DerivedView,
    pub stats: Stats,
    pub origin: LoadOrigin,
    pub error: Option<String>,
}

impl TimelineLoad {
    #[must_use]
    pub fn view(&self, filters: &FilterState) -> TimelineView {
        let view = derive_view(&self.incidents, filters);
        let stats = Stats::collect(&self.incidents, view.filtered.len());
        TimelineView {
            filters: filters.clone(),
            view,
            stats,
            origin: self.origin,
            error: self.error.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IncidentTimelineApi {
    source: Arc<dyn IncidentSource>,
}

impl std::fmt::Debug for IncidentTimelineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentTimelineApi").finish_non_exhaustive()
    }
}

impl IncidentTimelineApi {
    #[must_use]
    pub fn new(source: Arc<dyn IncidentSource>) -> Self {
        Self { source }
    }

    /// One round-trip to the source, rows in source order.
    ///
    /// # Errors
    /// Returns the source's [`FetchFailure`] unchanged.
    pub async fn fetch(&self) -> Result<Vec<Incident>, FetchFailure> {
        self.source.fetch_incidents().await
    }

    /// Fetch once and fall back to the sample set on any failure.
    ///
    /// Either way the records come back sorted newest-first.
    pub async fn load(&self) -> TimelineLoad {
        let (origin, mut incidents, error) = match self.fetch().await {
            Ok(incidents) => (LoadOrigin::Live, incidents, None),
            Err(err) => {
                tracing::warn!(error = %err, "incident fetch failed; using sample data");
                let message = format!("Error loading incidents: {err}");
                (LoadOrigin::Sample, sample_incidents(), Some(message))
            }
        };
        sort_newest_first(&mut incidents);
        TimelineLoad { origin, incidents, error, loaded_at: OffsetDateTime::now_utc() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RevalidateError {
    #[error("unknown revalidation path: {0}")]
    UnknownPath(String),
}

/// Something that can discard rendered state for a path so the next request
/// rebuilds it.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidateError>;
}

/// In-memory timeline state shared by the page and JSON views.
///
/// The first caller loads; concurrent callers wait on the same lock, so at
/// most one fetch is outstanding. Only live loads are kept: a sample fallback
/// is served to the caller that triggered it and the next caller fetches
/// again.
#[derive(Debug)]
pub struct TimelineCache {
    api: IncidentTimelineApi,
    current: Mutex<Option<Arc<TimelineLoad>>>,
}

impl TimelineCache {
    #[must_use]
    pub fn new(api: IncidentTimelineApi) -> Self {
        Self { api, current: Mutex::new(None) }
    }

    pub async fn get_or_load(&self) -> Arc<TimelineLoad> {
        let mut current = self.current.lock().await;
        if let Some(load) = current.as_ref() {
            return Arc::clone(load);
        }
        let load = Arc::new(self.api.load().await);
        if load.origin == LoadOrigin::Live {
            *current = Some(Arc::clone(&load));
        }
        load
    }

    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

#[async_trait]
impl Revalidator for TimelineCache {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
        if path != TIMELINE_PATH {
            return Err(RevalidateError::UnknownPath(path.to_string()));
        }
        self.invalidate().await;
        tracing::info!(path, "revalidated timeline");
        Ok(())
    }
}
