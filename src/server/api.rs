//! REST API handlers
//!
//! Routes map one-to-one onto the tracker, the schedule trigger and the
//! store.
//! Every failure is rendered as `{"message": "..."}` with a status derived
//! from the error category.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCategory, TakatrackErrorTrait};
use crate::models::{
    CollectionPoint, CollectionSchedule, Collector, NewCollectionPoint, NewRecyclingRecord,
    NewWasteBin, RecyclingRecord, ScheduleStatus, WasteBin, WasteBinUpdate,
};
use crate::scheduler::{GenerationReport, SchedulerError};

use super::ws::ws_handler;
use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub subscribers: usize,
}

/// Acknowledgement of a collector report
#[derive(Debug, Serialize)]
pub struct CollectorUpdated {
    pub message: String,
    pub data: Collector,
}

/// Result of an on-demand generation run
#[derive(Debug, Serialize)]
pub struct AssignDaysResponse {
    pub message: String,
    pub created: usize,
    pub failed: usize,
}

impl From<&GenerationReport> for AssignDaysResponse {
    fn from(report: &GenerationReport) -> Self {
        Self {
            message: "Collection days assigned".to_string(),
            created: report.created.len(),
            failed: report.failures.len(),
        }
    }
}

/// Body of `POST /collection_points`
#[derive(Debug, Default, Deserialize)]
pub struct CreatePointRequest {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Body of `POST /collector`
#[derive(Debug, Default, Deserialize)]
pub struct LocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Body of `PATCH /schedules/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `POST /api/bins`
#[derive(Debug, Default, Deserialize)]
pub struct CreateBinRequest {
    pub location: Option<String>,
    pub capacity: Option<f64>,
    pub fill_level: Option<f64>,
    pub status: Option<String>,
}

/// Body of `POST /api/recycling`
#[derive(Debug, Default, Deserialize)]
pub struct CreateRecyclingRequest {
    #[serde(rename = "type")]
    pub material: Option<String>,
    pub weight: Option<f64>,
    pub date: Option<String>,
    pub collected_by: Option<i64>,
}

/// Query of `POST /assign_days`
#[derive(Debug, Default, Deserialize)]
pub struct AssignDaysQuery {
    pub horizon: Option<i64>,
}

fn status_for(err: &Error) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Scheduler
            if matches!(err, Error::Scheduler(SchedulerError::InvalidHorizon { .. })) =>
        {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, category = self.category().label(), "Request failed");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, Error>;

/// Unwrap a JSON body, turning extractor rejections into validation errors
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::validation(format!("Invalid request body: {}", rejection.body_text())))
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/api/health", get(health_check))
        // Collection point endpoints
        .route("/collection_points", get(list_points).post(create_point))
        .route("/collection_points/{id}", get(get_point).delete(delete_point))
        .route("/collection_points/{id}/schedules", get(point_schedules))
        // Collector endpoints
        .route("/collector", get(get_collector).post(report_location))
        // Schedule endpoints
        .route("/assign_days", post(assign_days))
        .route("/schedules", get(list_schedules))
        .route("/schedules/{id}", patch(update_schedule).delete(delete_schedule))
        // Bin inventory and recycling log
        .route("/api/bins", get(list_bins).post(create_bin))
        .route("/api/bins/{id}", put(update_bin).delete(delete_bin))
        .route("/api/recycling", get(list_recycling).post(create_recycling))
        // Live updates
        .route("/ws", get(ws_handler))
        .with_state(state)
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        subscribers: state.broadcaster.subscriber_count(),
    })
}

// ============================================================================
// Collection Point Handlers
// ============================================================================

async fn list_points(State(state): State<AppState>) -> ApiResult<Json<Vec<CollectionPoint>>> {
    Ok(Json(state.store.list_points()?))
}

/// Create a point and immediately schedule its first collection
async fn create_point(
    State(state): State<AppState>,
    payload: Result<Json<CreatePointRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(payload)?;
    let new_point = NewCollectionPoint::from_parts(request.name, request.latitude, request.longitude)?;

    let point = state.store.insert_point(&new_point)?;
    tracing::info!(point_id = point.id, name = %point.name, "Collection point created");

    // The point exists either way; a failed run is picked up by the next trigger
    if let Err(e) = state.trigger.run_now().await {
        tracing::warn!(point_id = point.id, error = %e, "Schedule generation after create failed");
    }

    let point = state
        .store
        .get_point(point.id)?
        .ok_or_else(|| Error::not_found("collection point", point.id))?;

    Ok((StatusCode::CREATED, Json(point)).into_response())
}

async fn get_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CollectionPoint>> {
    state
        .store
        .get_point(id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("collection point", id))
}

async fn delete_point(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if state.store.delete_point(id)? {
        tracing::info!(point_id = id, "Collection point deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("collection point", id))
    }
}

async fn point_schedules(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<CollectionSchedule>>> {
    if state.store.get_point(id)?.is_none() {
        return Err(Error::not_found("collection point", id));
    }
    Ok(Json(state.store.schedules_for_point(id)?))
}

// ============================================================================
// Collector Handlers
// ============================================================================

/// Zero or one collector, as a list
async fn get_collector(State(state): State<AppState>) -> ApiResult<Json<Vec<Collector>>> {
    Ok(Json(state.tracker.get_location()?.into_iter().collect()))
}

async fn report_location(
    State(state): State<AppState>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> ApiResult<Json<CollectorUpdated>> {
    let request = json_body(payload)?;
    let collector = state
        .tracker
        .report_location(request.latitude, request.longitude)
        .await?;

    Ok(Json(CollectorUpdated {
        message: "Collector location updated".to_string(),
        data: collector,
    }))
}

// ============================================================================
// Schedule Handlers
// ============================================================================

async fn assign_days(
    State(state): State<AppState>,
    Query(query): Query<AssignDaysQuery>,
) -> ApiResult<Json<AssignDaysResponse>> {
    let report = match query.horizon {
        Some(horizon) => state.trigger.run_with_horizon(horizon).await?,
        None => state.trigger.run_now().await?,
    };
    Ok(Json(AssignDaysResponse::from(&report)))
}

async fn list_schedules(State(state): State<AppState>) -> ApiResult<Json<Vec<CollectionSchedule>>> {
    Ok(Json(state.store.list_schedules()?))
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<CollectionSchedule>> {
    let request = json_body(payload)?;
    let status = request
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(ScheduleStatus::from)
        .ok_or_else(|| Error::validation("Missing status"))?;

    if !status.is_known() {
        tracing::warn!(schedule_id = id, status = %status, "Storing unrecognised schedule status");
    }

    state
        .store
        .update_schedule_status(id, &status)?
        .map(Json)
        .ok_or_else(|| Error::not_found("schedule", id))
}

async fn delete_schedule(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if state.store.delete_schedule(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("schedule", id))
    }
}

// ============================================================================
// Bin Handlers
// ============================================================================

async fn list_bins(State(state): State<AppState>) -> ApiResult<Json<Vec<WasteBin>>> {
    Ok(Json(state.store.list_bins()?))
}

async fn create_bin(
    State(state): State<AppState>,
    payload: Result<Json<CreateBinRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(payload)?;
    let new_bin = NewWasteBin::from_parts(
        request.location,
        request.capacity,
        request.fill_level,
        request.status,
    )?;

    let bin = state.store.insert_bin(&new_bin)?;
    tracing::info!(bin_id = bin.id, location = %bin.location, "Waste bin created");

    Ok((StatusCode::CREATED, Json(bin)).into_response())
}

async fn update_bin(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<WasteBinUpdate>, JsonRejection>,
) -> ApiResult<Json<WasteBin>> {
    let update = json_body(payload)?;
    update.validate()?;

    state
        .store
        .update_bin(id, &update)?
        .map(Json)
        .ok_or_else(|| Error::not_found("waste bin", id))
}

async fn delete_bin(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.store.delete_bin(id)? {
        return Err(Error::not_found("waste bin", id));
    }
    tracing::info!(bin_id = id, "Waste bin deleted");

    Ok(Json(MessageResponse {
        message: "Bin deleted successfully".to_string(),
    }))
}

// ============================================================================
// Recycling Handlers
// ============================================================================

async fn list_recycling(State(state): State<AppState>) -> ApiResult<Json<Vec<RecyclingRecord>>> {
    Ok(Json(state.store.list_recycling_records()?))
}

async fn create_recycling(
    State(state): State<AppState>,
    payload: Result<Json<CreateRecyclingRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = json_body(payload)?;
    let new_record = NewRecyclingRecord::from_parts(
        request.material,
        request.weight,
        request.date,
        request.collected_by,
    )?;

    let record = state.store.insert_recycling_record(&new_record)?;
    tracing::info!(record_id = record.id, material = %record.material, "Recycling record created");

    Ok((StatusCode::CREATED, Json(record)).into_response())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{create_memory_store, MemoryStore, SharedStore, WasteStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router_with(store: SharedStore) -> Router {
        create_router(AppState::new(store, Config::default()).unwrap())
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(&Error::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::not_found("schedule", 1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&SchedulerError::invalid_horizon(999).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&Error::other("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_check() {
        let router = router_with(create_memory_store());
        let (status, body) = send(&router, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_create_point_missing_field() {
        let router = router_with(create_memory_store());
        let (status, body) = send(
            &router,
            "POST",
            "/collection_points",
            Some(r#"{"name": "CBD Hub", "latitude": -1.286}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing name or coordinates");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let router = router_with(create_memory_store());
        let (status, body) = send(&router, "POST", "/collector", Some("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_get_collector_empty_list() {
        let router = router_with(create_memory_store());
        let (status, body) = send(&router, "GET", "/collector", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_missing_point_is_not_found() {
        let router = router_with(create_memory_store());

        let (status, body) = send(&router, "GET", "/collection_points/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "collection point 42 not found");

        let (status, _) = send(&router, "DELETE", "/collection_points/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_schedule_status() {
        let router = router_with(create_memory_store());
        let (_, point) = send(
            &router,
            "POST",
            "/collection_points",
            Some(r#"{"name": "Karen Market", "latitude": -1.326, "longitude": 36.72}"#),
        )
        .await;
        let schedule_id = point["schedules"][0]["id"].as_i64().unwrap();
        let uri = format!("/schedules/{schedule_id}");

        let (status, _) = send(&router, "PATCH", &uri, Some("{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, "PATCH", &uri, Some(r#"{"status": "in-progress"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in-progress");

        let (status, _) = send(&router, "PATCH", "/schedules/999", Some(r#"{"status": "completed"}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assign_days_reports_failures() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store.clone());

        for name in ["A", "B"] {
            let body = format!(r#"{{"name": "{name}", "latitude": 1.0, "longitude": 2.0}}"#);
            send(&router, "POST", "/collection_points", Some(&body)).await;
        }
        let first_id = store.point_ids().unwrap()[0];
        store.fail_schedules_for(first_id);

        let (status, body) = send(&router, "POST", "/assign_days?horizon=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 1);
        assert_eq!(body["failed"], 1);

        let (status, _) = send(&router, "POST", "/assign_days?horizon=-4", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_assign_days_with_horizon_records_last_run() {
        let state = AppState::new(create_memory_store(), Config::default()).unwrap();
        let router = create_router(state.clone());
        send(
            &router,
            "POST",
            "/collection_points",
            Some(r#"{"name": "Kilimani", "latitude": -1.292, "longitude": 36.785}"#),
        )
        .await;
        assert_eq!(state.trigger.status().await.last_run.unwrap().horizon_days, 3);

        let (status, body) = send(&router, "POST", "/assign_days?horizon=6", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 1);

        let last = state.trigger.status().await.last_run.unwrap();
        assert_eq!(last.horizon_days, 6);
        assert_eq!(last.created, 1);
    }

    #[tokio::test]
    async fn test_bin_routes() {
        let router = router_with(create_memory_store());

        let (status, body) = send(&router, "POST", "/api/bins", Some(r#"{"location": "Gate 4"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Location and capacity are required");

        let (status, bin) = send(
            &router,
            "POST",
            "/api/bins",
            Some(r#"{"location": "Gate 4", "capacity": 240}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(bin["fill_level"], 0.0);
        assert_eq!(bin["status"], "active");
        let uri = format!("/api/bins/{}", bin["id"]);

        let (status, body) = send(&router, "PUT", &uri, Some(r#"{"fill_level": 120.5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fill_level"], 120.5);
        assert_eq!(body["location"], "Gate 4");

        let (status, _) = send(&router, "PUT", &uri, Some(r#"{"capacity": 0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Bin deleted successfully");

        let (status, _) = send(&router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, "PUT", &uri, Some("{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recycling_routes() {
        let router = router_with(create_memory_store());

        let (status, body) = send(
            &router,
            "POST",
            "/api/recycling",
            Some(r#"{"type": "glass", "weight": 4.2}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Type, weight, date, and collected_by are required");

        let (status, record) = send(
            &router,
            "POST",
            "/api/recycling",
            Some(r#"{"type": "glass", "weight": 4.2, "date": "2024-06-01", "collected_by": 3}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["type"], "glass");
        assert_eq!(record["date"], "2024-06-01");

        let (status, list) = send(&router, "GET", "/api/recycling", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, serde_json::json!([record]));
    }
}
