use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use clap::Parser;
use incident_api::{
    IncidentTimelineApi, RevalidateError, Revalidator, TimelineCache, TimelineView, TIMELINE_PATH,
};
use incident_core::{
    parse_filter_date, DateRange, FacetFilter, FetchFailure, FilterState, IncidentSource,
};
use incident_notion::{
    NotionClient, NotionConfig, DEFAULT_BASE_URL, DEFAULT_NOTION_VERSION, DEFAULT_TIMEOUT_SECS,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use url::form_urlencoded;

mod render;

const CRON_SECRET_HEADER: &str = "x-cron-secret";
const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;
const WEBHOOK_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Parser)]
#[command(name = "incident-service")]
#[command(about = "HTTP service for the incident timeline")]
struct Args {
    #[arg(long, env = "INCIDENTS_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, env = "NOTION_API_KEY", hide_env_values = true)]
    notion_api_key: Option<String>,
    #[arg(long, env = "NOTION_DATABASE_ID")]
    notion_database_id: Option<String>,
    #[arg(long, env = "NOTION_BASE_URL", default_value = DEFAULT_BASE_URL)]
    notion_base_url: String,
    #[arg(long, env = "NOTION_VERSION", default_value = DEFAULT_NOTION_VERSION)]
    notion_version: String,
    #[arg(long, env = "NOTION_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    request_timeout_secs: u64,
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    cron_secret: Option<String>,
}

impl Args {
    fn notion_config(&self) -> NotionConfig {
        NotionConfig {
            api_key: self.notion_api_key.clone(),
            database_id: self.notion_database_id.clone(),
            base_url: self.notion_base_url.clone(),
            notion_version: self.notion_version.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }
}

#[derive(Clone)]
struct ServiceState {
    api: IncidentTimelineApi,
    timeline: Arc<TimelineCache>,
    revalidator: Arc<dyn Revalidator>,
    cron_secret: Option<Arc<str>>,
}

impl ServiceState {
    fn new(source: Arc<dyn IncidentSource>, cron_secret: Option<String>) -> Self {
        let api = IncidentTimelineApi::new(source);
        let timeline = Arc::new(TimelineCache::new(api.clone()));
        Self {
            api,
            revalidator: timeline.clone(),
            timeline,
            cron_secret: cron_secret.filter(|secret| !secret.is_empty()).map(Arc::from),
        }
    }

    fn authorized(&self, provided: Option<&str>) -> bool {
        match (self.cron_secret.as_deref(), provided) {
            (Some(expected), Some(provided)) => expected == provided,
            _ => false,
        }
    }
}

/// Failures surfaced by the HTTP handlers.
///
/// `Refresh` and `Webhook` are internal errors; each endpoint keeps the body
/// shape its callers already parse.
#[derive(Debug)]
enum ServiceError {
    MethodNotAllowed { message: String, allow: Option<&'static str> },
    Unauthorized,
    Fetch(FetchFailure),
    Refresh(String),
    Webhook(String),
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ErrorBody {
    fn message(message: impl Into<String>) -> Self {
        Self { success: None, message: message.into(), error: None }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::MethodNotAllowed { message, allow } => {
                let mut response =
                    (StatusCode::METHOD_NOT_ALLOWED, Json(ErrorBody::message(message)))
                        .into_response();
                if let Some(allow) = allow {
                    response.headers_mut().insert(header::ALLOW, HeaderValue::from_static(allow));
                }
                response
            }
            Self::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::message("Unauthorized"))).into_response()
            }
            Self::Fetch(err) => {
                let body = ErrorBody {
                    error: Some(err.to_string()),
                    ..ErrorBody::message("Failed to fetch incidents")
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            Self::Refresh(error) => {
                let body = ErrorBody {
                    success: Some(false),
                    message: "Error refreshing data".to_string(),
                    error: Some(error),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            Self::Webhook(error) => {
                let body = ErrorBody {
                    error: Some(error),
                    ..ErrorBody::message("Error processing webhook")
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl From<RevalidateError> for ServiceError {
    fn from(err: RevalidateError) -> Self {
        Self::Refresh(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct RefreshResponse {
    success: bool,
    message: &'static str,
    timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
struct WebhookResponse {
    message: &'static str,
}

/// First value of `key` in a raw query string. Repeated keys never fail the
/// request.
fn first_query_value(raw: Option<&str>, key: &str) -> Option<String> {
    form_urlencoded::parse(raw?.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

/// Filter state as carried in the page and timeline query strings.
#[derive(Debug, Default)]
struct TimelineQuery {
    incident_type: Option<String>,
    resident: Option<String>,
    location: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl TimelineQuery {
    /// Unknown keys are ignored and the first occurrence of a key wins.
    fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "type" => &mut query.incident_type,
                "resident" => &mut query.resident,
                "location" => &mut query.location,
                "start" => &mut query.start,
                "end" => &mut query.end,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    fn filters(&self) -> FilterState {
        let facet =
            |value: Option<&str>| value.map_or(FacetFilter::All, FacetFilter::parse);
        let bound = |value: Option<&str>| value.and_then(parse_filter_date);
        FilterState {
            incident_type: facet(self.incident_type.as_deref()),
            resident: facet(self.resident.as_deref()),
            location: facet(self.location.as_deref()),
            date_range: DateRange::new(bound(self.start.as_deref()), bound(self.end.as_deref())),
        }
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(timeline_page))
        .route("/api/health", get(health))
        .route("/api/timeline", get(timeline_json))
        .route("/api/incidents", get(list_incidents).fallback(incidents_method_not_allowed))
        .route("/api/refresh-incidents", any(refresh_incidents))
        .route("/api/sync-notion", post(sync_notion).fallback(webhook_method_not_allowed))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.notion_config();
    if config.api_key.is_none() || config.database_id.is_none() {
        tracing::warn!("notion credentials are not configured; the timeline will use sample data");
    }
    if args.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set; refresh requests will be rejected");
    }

    let state = ServiceState::new(Arc::new(NotionClient::new(config)), args.cron_secret.clone());
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "incident service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
    response
}

async fn list_incidents(State(state): State<ServiceState>) -> Response {
    let response = match state.api.fetch().await {
        Ok(incidents) => (StatusCode::OK, Json(incidents)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "error in incidents api");
            ServiceError::Fetch(err).into_response()
        }
    };
    with_cors(response)
}

async fn incidents_method_not_allowed() -> Response {
    with_cors(
        ServiceError::MethodNotAllowed { message: "Method not allowed".to_string(), allow: None }
            .into_response(),
    )
}

async fn refresh_incidents(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<RefreshResponse>, ServiceError> {
    let query_secret = first_query_value(query.as_deref(), "secret");
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(query_secret.as_deref());
    if !state.authorized(provided) {
        tracing::warn!("rejected refresh request with missing or mismatched secret");
        return Err(ServiceError::Unauthorized);
    }

    state.revalidator.revalidate(TIMELINE_PATH).await.map_err(|err| {
        tracing::error!(error = %err, "error refreshing data");
        ServiceError::from(err)
    })?;
    tracing::info!("revalidated index page via refresh trigger");

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| ServiceError::Refresh(err.to_string()))?;
    Ok(Json(RefreshResponse {
        success: true,
        message: "Data refresh triggered successfully",
        timestamp,
    }))
}

async fn sync_notion(
    State(state): State<ServiceState>,
    body: Body,
) -> Result<Json<WebhookResponse>, ServiceError> {
    let bytes = to_bytes(body, WEBHOOK_BODY_LIMIT).await.map_err(|err| {
        tracing::error!(error = %err, "error processing webhook");
        ServiceError::Webhook(err.to_string())
    })?;
    let raw = String::from_utf8_lossy(&bytes);
    let preview: String = raw.chars().take(WEBHOOK_PREVIEW_CHARS).collect();
    tracing::info!(preview = %format!("{preview}..."), "received update from notion");

    match state.revalidator.revalidate(TIMELINE_PATH).await {
        Ok(()) => tracing::info!("revalidated index page"),
        Err(err) => tracing::error!(error = %err, "error revalidating"),
    }

    Ok(Json(WebhookResponse { message: "Webhook received successfully" }))
}

async fn webhook_method_not_allowed(method: Method) -> ServiceError {
    ServiceError::MethodNotAllowed {
        message: format!("Method {method} not allowed"),
        allow: Some("POST"),
    }
}

async fn load_view(state: &ServiceState, query: &TimelineQuery) -> TimelineView {
    state.timeline.get_or_load().await.view(&query.filters())
}

async fn timeline_json(
    State(state): State<ServiceState>,
    RawQuery(query): RawQuery,
) -> Json<TimelineView> {
    Json(load_view(&state, &TimelineQuery::parse(query.as_deref())).await)
}

async fn timeline_page(
    State(state): State<ServiceState>,
    RawQuery(query): RawQuery,
) -> Response {
    let view = load_view(&state, &TimelineQuery::parse(query.as_deref())).await;
    match render::timeline_page(&view) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render timeline page");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render timeline").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use http::Request;
    use incident_core::{Incident, StaticSource};
    use tower::ServiceExt;

    use super::*;

    const SECRET: &str = "cron-test-secret";

    /// Fails the first `failures` fetches, then returns one vandalism row.
    struct FailingSource {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl IncidentSource for FailingSource {
        async fn fetch_incidents(&self) -> Result<Vec<Incident>, FetchFailure> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(FetchFailure::Network("connection refused".to_string()));
            }
            match serde_json::from_value(serde_json::json!([{
                "Incident": "Broken gate latch",
                "Date": "2025-04-02",
                "Type": "Vandalism",
                "Location": "Alley"
            }])) {
                Ok(incidents) => Ok(incidents),
                Err(err) => panic!("fixture should deserialize: {err}"),
            }
        }
    }

    struct BrokenRevalidator;

    #[async_trait]
    impl Revalidator for BrokenRevalidator {
        async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
            Err(RevalidateError::UnknownPath(path.to_string()))
        }
    }

    fn with_broken_revalidator(mut state: ServiceState) -> ServiceState {
        state.revalidator = Arc::new(BrokenRevalidator);
        state
    }

    fn sample_state() -> ServiceState {
        ServiceState::new(Arc::new(StaticSource::sample()), Some(SECRET.to_string()))
    }

    fn failing_state(failures: usize) -> (ServiceState, Arc<FailingSource>) {
        let source = Arc::new(FailingSource { calls: AtomicUsize::new(0), failures });
        (ServiceState::new(source.clone(), Some(SECRET.to_string())), source)
    }

    fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .body(body)
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    async fn send(router: Router, request: Request<Body>) -> Response {
        match router.oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    async fn response_text(response: Response) -> String {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = response_text(response).await;
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = send(app(sample_state()), request("GET", "/api/health", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn incidents_endpoint_returns_raw_rows_with_cors() {
        let response =
            send(app(sample_state()), request("GET", "/api/incidents", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(HeaderValue::as_bytes),
            Some(&b"*"[..])
        );

        let value = response_json(response).await;
        let rows = value.as_array().unwrap_or_else(|| panic!("expected an array: {value}"));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["Incident"], "Patio Storage breakin attempted");
        assert_eq!(rows[3]["Resident Name"], "John Smith");
        assert_eq!(rows[3]["Estimated Value"], 49.99);
    }

    #[tokio::test]
    async fn incidents_endpoint_rejects_other_methods() {
        let response =
            send(app(sample_state()), request("POST", "/api/incidents", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response_json(response).await,
            serde_json::json!({"message": "Method not allowed"})
        );
    }

    #[tokio::test]
    async fn incidents_endpoint_reports_upstream_failure() {
        let (state, _) = failing_state(usize::MAX);
        let response = send(app(state), request("GET", "/api/incidents", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let value = response_json(response).await;
        assert_eq!(value["message"], "Failed to fetch incidents");
        assert_eq!(value["error"], "Failed to fetch incidents: connection refused");
    }

    #[tokio::test]
    async fn refresh_rejects_wrong_secret() {
        let response = send(
            app(sample_state()),
            request("GET", "/api/refresh-incidents?secret=nope", Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_json(response).await, serde_json::json!({"message": "Unauthorized"}));
    }

    #[tokio::test]
    async fn refresh_is_unauthorized_when_no_secret_is_configured() {
        let state = ServiceState::new(Arc::new(StaticSource::sample()), None);
        let response =
            send(app(state), request("GET", "/api/refresh-incidents", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_accepts_header_secret_and_invalidates_timeline() {
        let state = sample_state();
        let _ = state.timeline.get_or_load().await;
        assert!(state.timeline.is_loaded().await);

        let request = Request::builder()
            .uri("/api/refresh-incidents")
            .method("POST")
            .header(CRON_SECRET_HEADER, SECRET)
            .body(Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"));
        let response = send(app(state.clone()), request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Data refresh triggered successfully");
        let timestamp = value["timestamp"].as_str().unwrap_or_default();
        assert!(OffsetDateTime::parse(timestamp, &Rfc3339).is_ok(), "{timestamp}");
        assert!(!state.timeline.is_loaded().await);
    }

    #[tokio::test]
    async fn refresh_reports_revalidation_failure() {
        let state = with_broken_revalidator(sample_state());
        let response = send(
            app(state),
            request("GET", &format!("/api/refresh-incidents?secret={SECRET}"), Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let value = response_json(response).await;
        assert_eq!(value["success"], false);
        assert_eq!(value["message"], "Error refreshing data");
    }

    #[tokio::test]
    async fn webhook_accepts_arbitrary_body() {
        let state = sample_state();
        let _ = state.timeline.get_or_load().await;

        let body = "x".repeat(500);
        let response =
            send(app(state.clone()), request("POST", "/api/sync-notion", Body::from(body))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await,
            serde_json::json!({"message": "Webhook received successfully"})
        );
        assert!(!state.timeline.is_loaded().await);
    }

    #[tokio::test]
    async fn webhook_succeeds_even_when_revalidation_fails() {
        let state = with_broken_revalidator(sample_state());
        let response =
            send(app(state), request("POST", "/api/sync-notion", Body::from("not json {"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_rejects_non_post_with_allow_header() {
        let response =
            send(app(sample_state()), request("GET", "/api/sync-notion", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::ALLOW).map(HeaderValue::as_bytes),
            Some(&b"POST"[..])
        );
        assert_eq!(
            response_json(response).await,
            serde_json::json!({"message": "Method GET not allowed"})
        );
    }

    #[tokio::test]
    async fn timeline_json_applies_filters_and_keeps_full_facets() {
        let response = send(
            app(sample_state()),
            request("GET", "/api/timeline?type=Theft&resident=all", Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value["filters"]["type"], "Theft");
        assert_eq!(value["stats"]["filtered"], 1);
        assert_eq!(value["stats"]["total"], 4);
        assert_eq!(value["view"]["groups"][0]["key"], "2025-1");
        assert_eq!(
            value["view"]["facets"]["types"],
            serde_json::json!(["all", "Theft", "Disturbance", "Vandalism"])
        );
        assert_eq!(value["error"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn timeline_ignores_single_date_bound() {
        let response = send(
            app(sample_state()),
            request("GET", "/api/timeline?start=2030-01-01&end=", Body::empty()),
        )
        .await;
        let value = response_json(response).await;
        assert_eq!(value["stats"]["filtered"], 4);
    }

    #[tokio::test]
    async fn fetch_failure_renders_sample_page_with_banner() {
        let (state, _) = failing_state(usize::MAX);
        let router = app(state);

        let page = send(router.clone(), request("GET", "/", Body::empty())).await;
        assert_eq!(page.status(), StatusCode::OK);
        let html = response_text(page).await;
        assert!(html.contains("role=\"alert\">Error loading incidents: Failed to fetch incidents"));
        assert!(html.contains("Showing 4 of 4 incidents"));

        let filtered =
            send(router, request("GET", "/?type=Vandalism&location=", Body::empty())).await;
        let html = response_text(filtered).await;
        assert!(html.contains("Showing 2 of 4 incidents"));
    }

    #[tokio::test]
    async fn transient_fetch_failure_recovers_on_next_request() {
        let (state, source) = failing_state(1);
        let router = app(state);

        let first = response_json(
            send(router.clone(), request("GET", "/api/timeline", Body::empty())).await,
        )
        .await;
        assert_eq!(first["origin"], "sample");
        assert_eq!(first["stats"]["total"], 4);
        assert!(first["error"].as_str().is_some_and(|error| error.contains("connection refused")));

        let second = response_json(
            send(router.clone(), request("GET", "/api/timeline", Body::empty())).await,
        )
        .await;
        assert_eq!(second["origin"], "live");
        assert_eq!(second["stats"]["total"], 1);
        assert_eq!(second["error"], serde_json::Value::Null);

        let page = send(router, request("GET", "/?type=Vandalism", Body::empty())).await;
        let html = response_text(page).await;
        assert!(html.contains("Showing 1 of 1 incidents"));
        assert!(!html.contains("role=\"alert\""));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_accepts_query_secret() {
        let response = send(
            app(sample_state()),
            request("GET", &format!("/api/refresh-incidents?secret={SECRET}"), Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn refresh_header_secret_takes_precedence_over_query() {
        let request = Request::builder()
            .uri(format!("/api/refresh-incidents?secret={SECRET}"))
            .method("GET")
            .header(CRON_SECRET_HEADER, "wrong-secret")
            .body(Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"));
        let response = send(app(sample_state()), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_json(response).await, serde_json::json!({"message": "Unauthorized"}));
    }

    #[tokio::test]
    async fn refresh_with_repeated_secret_uses_first_value() {
        let rejected = send(
            app(sample_state()),
            request(
                "GET",
                &format!("/api/refresh-incidents?secret=nope&secret={SECRET}"),
                Body::empty(),
            ),
        )
        .await;
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_json(rejected).await, serde_json::json!({"message": "Unauthorized"}));

        let accepted = send(
            app(sample_state()),
            request(
                "GET",
                &format!("/api/refresh-incidents?secret={SECRET}&secret=nope"),
                Body::empty(),
            ),
        )
        .await;
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn timeline_with_repeated_filter_key_uses_first_value() {
        let response = send(
            app(sample_state()),
            request("GET", "/api/timeline?type=Theft&type=Vandalism&extra=1", Body::empty()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(value["filters"]["type"], "Theft");
        assert_eq!(value["stats"]["filtered"], 1);

        let page = send(
            app(sample_state()),
            request("GET", "/?resident=Amna+Akbar&resident=John+Smith", Body::empty()),
        )
        .await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(response_text(page).await.contains("Showing 2 of 4 incidents"));
    }

    #[test]
    fn query_string_parsing_decodes_and_ignores_unknown_keys() {
        let query =
            TimelineQuery::parse(Some("resident=Amna%20Akbar&start=2025-01-01&x=y&start=bad"));
        assert_eq!(query.resident.as_deref(), Some("Amna Akbar"));
        assert_eq!(query.start.as_deref(), Some("2025-01-01"));
        assert_eq!(query.incident_type, None);
        assert!(TimelineQuery::parse(None).filters().is_unrestricted());
        assert_eq!(first_query_value(Some("a=1&secret=s%3Dx"), "secret").as_deref(), Some("s=x"));
        assert_eq!(first_query_value(None, "secret"), None);
    }

    #[test]
    fn query_parses_blank_values_as_unrestricted() {
        let query = TimelineQuery {
            incident_type: Some(String::new()),
            resident: Some("all".to_string()),
            location: None,
            start: Some("2025-01-01".to_string()),
            end: Some("not-a-date".to_string()),
        };
        let filters = query.filters();
        assert!(filters.incident_type.is_all());
        assert!(filters.resident.is_all());
        assert!(filters.date_range.start.is_some());
        assert!(filters.date_range.end.is_none());
        assert!(filters.is_unrestricted());
    }
}
