use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::db::{DbHandle, InspectionFilter};
#[cfg(test)]
use super::db::TrackerDb;
use super::models::*;
use super::quality::{self, HourlyDashboard, QualitySummary};
use crate::config::LimitsConfig;
use crate::errors::TrackerError;

/// Number of defects shown on the quality summary board.
const SUMMARY_TOP_DEFECTS: usize = 3;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub limits: LimitsConfig,
}

pub type SharedState = Arc<AppState>;

// ── Response envelope ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        count: None,
        data,
    })
}

fn ok_with_message<T: Serialize>(data: T, message: &str) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.to_string()),
        count: None,
        data,
    })
}

fn ok_list<T: Serialize>(data: Vec<T>) -> Json<Envelope<Vec<T>>> {
    Json(Envelope {
        success: true,
        message: None,
        count: Some(data.len()),
        data,
    })
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveHourlyProductionRequest {
    #[serde(default)]
    pub header_id: Option<Value>,
    #[serde(default)]
    pub hour: Option<Value>,
    #[serde(default)]
    pub achieved_qty: Option<Value>,
    #[serde(default)]
    pub production_user: Option<ProductionUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyProductionQuery {
    pub header_id: Option<String>,
    pub production_user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegisterRequest {
    #[serde(flatten)]
    pub line_info: LineInfo,
    #[serde(default, alias = "created_by")]
    pub created_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterQuery {
    #[serde(default, alias = "created_by")]
    pub created_by: Option<String>,
}

/// Author reference as some clients post it on top inputs.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatedByRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionTopRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user_name: Option<String>,
    #[serde(default, alias = "created_by")]
    pub created_by: Option<CreatedByRef>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(flatten)]
    pub line_info: LineInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionTopQuery {
    pub user_id: Option<String>,
    pub date: Option<String>,
    pub limit: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionEntry {
    #[serde(default)]
    pub hour: Option<Value>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub inspected_qty: i64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub passed_qty: i64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub defective_pcs: i64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub after_repair: i64,
    #[serde(default, deserialize_with = "lenient::opt_count")]
    pub total_defects: Option<i64>,
    #[serde(default)]
    pub selected_defects: Vec<SelectedDefect>,
}

/// Why a posted count is unacceptable, if it is.
fn count_problem(value: i64) -> Option<String> {
    if value < 0 {
        Some("must be a non-negative number".to_string())
    } else if value > MAX_PIECES {
        Some(format!("must not exceed {}", MAX_PIECES))
    } else {
        None
    }
}

impl InspectionEntry {
    /// One message per out-of-range count, prefixed with the hour label.
    fn validate(&self, label: &str) -> Vec<String> {
        let fields = [
            ("inspectedQty", Some(self.inspected_qty)),
            ("passedQty", Some(self.passed_qty)),
            ("defectivePcs", Some(self.defective_pcs)),
            ("afterRepair", Some(self.after_repair)),
            ("totalDefects", self.total_defects),
        ];
        let mut errors: Vec<String> = fields
            .into_iter()
            .filter_map(|(name, value)| {
                let problem = count_problem(value?)?;
                Some(format!("{}: {} {}", label, name, problem))
            })
            .collect();
        for defect in &self.selected_defects {
            if let Some(problem) = count_problem(defect.quantity) {
                let name = match defect.name.trim() {
                    "" => "Unknown",
                    name => name,
                };
                errors.push(format!("{}: defect '{}' quantity {}", label, name, problem));
            }
        }
        errors
    }

    fn into_counts(self) -> InspectionCounts {
        let total_defects = self.total_defects.unwrap_or_else(|| {
            self.selected_defects
                .iter()
                .map(|d| d.quantity)
                .fold(0, i64::saturating_add)
        });
        InspectionCounts {
            selected_defects: self.selected_defects,
            total_defects,
            defective_pcs: self.defective_pcs,
            inspected_qty: self.inspected_qty,
            passed_qty: self.passed_qty,
            after_repair: self.after_repair,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyInspectionBatch {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub entries: Vec<InspectionEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyInspectionQuery {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionHeaderRequest {
    #[serde(default)]
    pub header_date: Option<String>,
    #[serde(default)]
    pub production_user: Option<ProductionUser>,
    #[serde(default)]
    pub quality_user: Option<QualityUser>,
    #[serde(flatten)]
    pub figures: FigureInputs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionHeaderQuery {
    pub production_user_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLinkQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLinkRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub image_src: Option<String>,
    #[serde(default)]
    pub video_src: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    pub user_name: Option<String>,
    pub date: Option<String>,
}

// ── Extractors ────────────────────────────────────────────────────────

/// `Json` body whose rejection is answered with the JSON error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Path` parameters, rejected through the JSON error envelope.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `Query` string, rejected through the JSON error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Validation(Vec<String>),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => {
                tracing::warn!(?errors, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({
                        "success": false,
                        "message": errors.join("; "),
                        "errors": errors,
                    }),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(%msg, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"success": false, "message": msg}),
                )
            }
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({"success": false, "message": msg}),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                serde_json::json!({"success": false, "message": msg}),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(%msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"success": false, "message": msg}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Validation(errors) => ApiError::Validation(errors),
            TrackerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            TrackerError::Conflict(msg) => ApiError::Conflict(msg),
            TrackerError::InvalidDate(_) => ApiError::BadRequest(err.to_string()),
            TrackerError::LockPoisoned => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TrackerError>() {
            Ok(tracker) => tracker.into(),
            Err(other) => ApiError::Internal(format!("{:#}", other)),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/hourly-productions",
            get(list_hourly_productions).post(save_hourly_production),
        )
        .route("/api/hourly-productions/{id}", delete(delete_hourly_production))
        .route("/api/register", get(list_registers).post(create_register))
        .route("/api/register/{id}", get(get_register).delete(delete_register))
        .route(
            "/api/inspection-top",
            get(list_inspection_tops).post(upsert_inspection_top),
        )
        .route(
            "/api/inspection-top/{id}",
            put(update_inspection_top).delete(delete_inspection_top),
        )
        .route(
            "/api/hourly-inspections",
            get(list_hourly_inspections).post(save_hourly_inspections),
        )
        .route("/api/hourly-inspections/{id}", delete(delete_hourly_inspection))
        .route(
            "/api/production-headers",
            get(find_production_header).post(create_production_header),
        )
        .route("/api/production-headers/latest", get(latest_production_header))
        .route(
            "/api/production-headers/{id}",
            get(get_production_header)
                .patch(update_production_header)
                .delete(delete_production_header),
        )
        .route(
            "/api/media-links",
            get(get_media_link).post(create_media_link).patch(update_media_link),
        )
        .route("/api/quality-summary", get(quality_summary))
        .route("/api/hourly-dashboard", get(hourly_dashboard))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Trimmed, non-empty string or `None`.
fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Record id from a JSON number or numeric string.
fn parse_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
}

/// A date filter on listings: absent means no filter.
fn optional_date(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>, ApiError> {
    match present(raw) {
        Some(s) => Ok(Some(parse_date(Some(&s))?)),
        None => Ok(None),
    }
}

/// Resolve the `limit` query parameter against the configured bounds.
/// Missing, unparsable or zero means the default.
fn resolve_limit(raw: Option<&str>, limits: &LimitsConfig) -> usize {
    let requested = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n != 0)
        .map(|n| n.unsigned_abs() as usize)
        .unwrap_or(limits.inspection_top_default);
    requested.min(limits.inspection_top_max).max(1)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

// ── Hourly production ─────────────────────────────────────────────────

async fn list_hourly_productions(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<HourlyProductionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let raw = present(query.header_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("headerId is required".into()))?;
    let header_id = parse_id(&Value::String(raw))
        .ok_or_else(|| ApiError::BadRequest("headerId must be a valid id".into()))?;
    let user_id = present(query.production_user_id.as_deref());
    let rows = state
        .db
        .call(move |db| db.list_hourly_productions(header_id, user_id.as_deref()))
        .await?;
    Ok(ok(rows))
}

async fn save_hourly_production(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<SaveHourlyProductionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();

    let header_id = req.header_id.as_ref().and_then(parse_id);
    if header_id.is_none() {
        errors.push("headerId is required".to_string());
    }
    let hour = req.hour.as_ref().and_then(parse_hour);
    if hour.is_none() {
        errors.push("hour must be a positive number".to_string());
    }
    let user = req.production_user.filter(|u| !u.id.trim().is_empty());
    if user.is_none() {
        errors.push("productionUser.id is required".to_string());
    }
    let achieved = req.achieved_qty.as_ref().map_or(0.0, to_number_or_zero);
    if achieved < 0.0 {
        errors.push("achievedQty must be a non-negative number".to_string());
    }

    let (Some(header_id), Some(hour), Some(user)) = (header_id, hour, user) else {
        return Err(TrackerError::Validation(errors).into());
    };
    if !errors.is_empty() {
        return Err(TrackerError::Validation(errors).into());
    }

    let record = state
        .db
        .call(move |db| db.save_hourly_production(header_id, hour, achieved, &user))
        .await?;
    tracing::info!(
        header_id,
        hour,
        achieved,
        dynamic_target = record.dynamic_target,
        "Saved hourly production"
    );
    Ok(ok_with_message(
        record,
        "Hourly production record saved successfully",
    ))
}

async fn delete_hourly_production(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| db.delete_hourly_production(id))
        .await?;
    match deleted {
        true => Ok(ok_with_message(Value::Null, "Hourly production record deleted")),
        false => Err(TrackerError::not_found("Hourly production", id).into()),
    }
}

// ── Registration ──────────────────────────────────────────────────────

async fn create_register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let info = req.line_info.trimmed();
    let created_by = present(req.created_by.as_deref());
    let required = [&info.buyer, &info.building, &info.floor, &info.line];
    let Some(created_by) = created_by.filter(|_| required.iter().all(|f| !f.is_empty())) else {
        return Err(ApiError::BadRequest(
            "All fields including created_by are required".into(),
        ));
    };

    let register = state
        .db
        .call(move |db| db.create_register(&info, &created_by))
        .await?;
    tracing::info!(id = register.id, line = %register.line_info.line, "Registered line");
    Ok((
        StatusCode::CREATED,
        ok_with_message(register, "Record saved successfully"),
    ))
}

async fn list_registers(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<RegisterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let created_by = present(query.created_by.as_deref());
    let registers = state
        .db
        .call(move |db| db.list_registers(created_by.as_deref()))
        .await?;
    Ok(ok_list(registers))
}

async fn get_register(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.db.call(move |db| db.get_register(id)).await?;
    match register {
        Some(register) => Ok(ok(register)),
        None => Err(TrackerError::not_found("Register", id).into()),
    }
}

async fn delete_register(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_register(id)).await?;
    match deleted {
        true => Ok(ok_with_message(Value::Null, "Register deleted")),
        false => Err(TrackerError::not_found("Register", id).into()),
    }
}

// ── Inspection top input ──────────────────────────────────────────────

async fn upsert_inspection_top(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<InspectionTopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created_by = req.created_by.unwrap_or_default();
    let user_id = present(req.user_id.as_deref()).or_else(|| present(created_by.id.as_deref()));
    let user_name =
        present(req.user_name.as_deref()).or_else(|| present(created_by.user_name.as_deref()));
    let (Some(id), Some(user_name)) = (user_id, user_name) else {
        return Err(ApiError::BadRequest("userId and userName are required".into()));
    };
    let report_date = parse_date(req.report_date.as_deref())?;
    let user = UserRef { id, user_name };
    let info = req.line_info.trimmed();

    let top = state
        .db
        .call(move |db| db.upsert_inspection_top(&user, report_date, &info))
        .await?;
    tracing::info!(id = top.id, line = %top.line_info.line, "Saved inspection top input");
    Ok(ok_with_message(top, "Top input saved."))
}

async fn list_inspection_tops(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<InspectionTopQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = present(query.user_id.as_deref());
    let date = optional_date(query.date.as_deref())?;
    let limit = resolve_limit(query.limit.as_deref(), &state.limits);
    let tops = state
        .db
        .call(move |db| db.list_inspection_tops(user_id.as_deref(), date, limit))
        .await?;
    Ok(ok_list(tops))
}

async fn update_inspection_top(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(info): ApiJson<LineInfo>,
) -> Result<impl IntoResponse, ApiError> {
    let info = info.trimmed();
    let top = state
        .db
        .call(move |db| db.update_inspection_top(id, &info))
        .await?;
    match top {
        Some(top) => Ok(ok(top)),
        None => Err(TrackerError::not_found("Inspection top input", id).into()),
    }
}

async fn delete_inspection_top(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| db.delete_inspection_top(id))
        .await?;
    match deleted {
        true => Ok(ok_with_message(Value::Null, "Inspection top input deleted")),
        false => Err(TrackerError::not_found("Inspection top input", id).into()),
    }
}

// ── Hourly inspections ────────────────────────────────────────────────

async fn save_hourly_inspections(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<HourlyInspectionBatch>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();
    let user_id = present(req.user_id.as_deref());
    let user_name = present(req.user_name.as_deref());
    if user_id.is_none() || user_name.is_none() {
        errors.push("userId and userName are required".to_string());
    }
    if req.entries.is_empty() {
        errors.push("At least one entry is required".to_string());
    }

    let mut entries = Vec::with_capacity(req.entries.len());
    for entry in req.entries {
        match entry.hour.as_ref().and_then(parse_hour) {
            Some(hour) if hour <= HOURS_PER_SHIFT => {
                let problems = entry.validate(&hour_label(hour));
                if problems.is_empty() {
                    entries.push((hour, entry.into_counts()));
                } else {
                    errors.extend(problems);
                }
            }
            Some(hour) => errors.push(format!(
                "{} is outside the {}-hour shift",
                hour_label(hour),
                HOURS_PER_SHIFT
            )),
            None => errors.push("Please select Working Hour.".to_string()),
        }
    }

    let (Some(id), Some(user_name)) = (user_id, user_name) else {
        return Err(TrackerError::Validation(errors).into());
    };
    if !errors.is_empty() {
        return Err(TrackerError::Validation(errors).into());
    }
    let report_date = parse_date(req.report_date.as_deref())?;
    let user = UserRef { id, user_name };

    let saved = state
        .db
        .call(move |db| db.save_hourly_inspections(&user, report_date, &entries))
        .await?;
    tracing::info!(count = saved.len(), %report_date, "Saved hourly inspections");
    Ok(ok_list(saved))
}

async fn list_hourly_inspections(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<HourlyInspectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = InspectionFilter {
        user_id: present(query.user_id.as_deref()),
        user_name: present(query.user_name.as_deref()),
        report_date: optional_date(query.date.as_deref())?,
    };
    let rows = state
        .db
        .call(move |db| db.list_hourly_inspections(&filter))
        .await?;
    Ok(ok_list(rows))
}

async fn delete_hourly_inspection(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| db.delete_hourly_inspection(id))
        .await?;
    match deleted {
        true => Ok(ok_with_message(Value::Null, "Hourly inspection deleted")),
        false => Err(TrackerError::not_found("Hourly inspection", id).into()),
    }
}

// ── Production headers ────────────────────────────────────────────────

async fn create_production_header(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ProductionHeaderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = req.figures.validate();
    let user = req.production_user.filter(|u| !u.id.trim().is_empty());
    if user.is_none() {
        errors.insert(0, "productionUser.id is required".to_string());
    }
    let Some(user) = user.filter(|_| errors.is_empty()) else {
        return Err(TrackerError::Validation(errors).into());
    };
    let header_date = parse_date(req.header_date.as_deref())?;
    let figures = req.figures.to_figures();
    let quality_user = req.quality_user;

    let header = state
        .db
        .call(move |db| {
            db.create_production_header(header_date, &user, quality_user.as_ref(), &figures)
        })
        .await?;
    tracing::info!(id = header.id, user = %header.production_user.id, %header_date, "Created production header");
    Ok((StatusCode::CREATED, ok(header)))
}

async fn find_production_header(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ProductionHeaderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = present(query.production_user_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("productionUserId is required".into()))?;
    let date = parse_date(query.date.as_deref())?;
    let header = state
        .db
        .call(move |db| db.find_production_header(&user_id, date))
        .await?;
    Ok(ok(header))
}

async fn latest_production_header(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let header = state
        .db
        .call(|db| db.latest_production_header())
        .await?;
    Ok(ok(header))
}

async fn get_production_header(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let header = state
        .db
        .call(move |db| db.get_production_header(id))
        .await?;
    match header {
        Some(header) => Ok(ok(header)),
        None => Err(TrackerError::not_found("Production header", id).into()),
    }
}

async fn update_production_header(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ProductionHeaderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = req.figures.validate();
    if !errors.is_empty() {
        return Err(TrackerError::Validation(errors).into());
    }
    let figures = req.figures;
    let quality_user = req.quality_user;
    let header = state
        .db
        .call(move |db| db.update_production_header(id, &figures, quality_user.as_ref()))
        .await?;
    match header {
        Some(header) => {
            tracing::info!(id, "Updated production header");
            Ok(ok(header))
        }
        None => Err(TrackerError::not_found("Production header", id).into()),
    }
}

async fn delete_production_header(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| db.delete_production_header(id))
        .await?;
    match deleted {
        true => Ok(ok_with_message(Value::Null, "Production header deleted")),
        false => Err(TrackerError::not_found("Production header", id).into()),
    }
}

// ── Media links ───────────────────────────────────────────────────────

async fn get_media_link(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<MediaLinkQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = present(query.user_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;
    let link = state
        .db
        .call(move |db| db.get_media_link(&user_id))
        .await?;
    Ok(ok(link))
}

async fn create_media_link(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<MediaLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(id), Some(user_name)) = (
        present(req.user_id.as_deref()),
        present(req.user_name.as_deref()),
    ) else {
        return Err(ApiError::BadRequest("userId and userName are required".into()));
    };
    let user = UserRef { id, user_name };
    let image_src = req.image_src.unwrap_or_default();
    let video_src = req.video_src.unwrap_or_default();

    let link = state
        .db
        .call(move |db| db.create_media_link(&user, &image_src, &video_src))
        .await?;
    tracing::info!(user = %link.user.id, "Created media links");
    Ok((StatusCode::CREATED, ok(link)))
}

async fn update_media_link(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<MediaLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = present(req.user_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;
    let image_src = req.image_src.unwrap_or_default();
    let video_src = req.video_src.unwrap_or_default();

    let link = state
        .db
        .call(move |db| db.update_media_link(&user_id, &image_src, &video_src))
        .await?;
    match link {
        Some(link) => Ok(ok(link)),
        None => Err(ApiError::NotFound(
            "Media links not found. Use POST to create.".into(),
        )),
    }
}

// ── Quality boards ────────────────────────────────────────────────────

async fn board_rows(
    state: &SharedState,
    query: BoardQuery,
) -> Result<(String, Vec<HourlyInspection>), ApiError> {
    let user_name = present(query.user_name.as_deref())
        .ok_or_else(|| ApiError::BadRequest("userName is required".into()))?;
    let filter = InspectionFilter {
        user_id: None,
        user_name: Some(user_name.clone()),
        report_date: Some(parse_date(query.date.as_deref())?),
    };
    let rows = state
        .db
        .call(move |db| db.list_hourly_inspections(&filter))
        .await?;
    Ok((user_name, rows))
}

async fn quality_summary(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<BoardQuery>,
) -> Result<Json<Envelope<QualitySummary>>, ApiError> {
    let (user_name, rows) = board_rows(&state, query).await?;
    let media = state
        .db
        .call(move |db| db.find_media_link_by_user_name(&user_name))
        .await?;
    let (image_src, video_src) = media
        .map(|m| (m.image_src, m.video_src))
        .unwrap_or_default();
    Ok(ok(quality::summarize(
        &rows,
        image_src,
        video_src,
        SUMMARY_TOP_DEFECTS,
    )))
}

async fn hourly_dashboard(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<BoardQuery>,
) -> Result<Json<Envelope<HourlyDashboard>>, ApiError> {
    let (_, rows) = board_rows(&state, query).await?;
    Ok(ok(quality::hourly_dashboard(&rows)))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let db = TrackerDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            limits: LimitsConfig::default(),
        });
        api_router().with_state(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn send_raw(app: &Router, method: &str, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    fn is_json(response: &Response) -> bool {
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"))
    }

    async fn create_header(app: &Router) -> i64 {
        let response = send(
            app,
            "POST",
            "/api/production-headers",
            Some(serde_json::json!({
                "headerDate": "2025-11-15",
                "productionUser": {"id": "prod-7", "Production_user_name": "Rahim"},
                "manpowerPresent": "50",
                "smv": 1.2,
                "planEfficiency": 90,
                "todayTarget": 800,
                "workingHour": "8"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_hourly_production_validation_collects_all_errors() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/hourly-productions",
            Some(serde_json::json!({"hour": 0, "achievedQty": -5})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        let errors: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_str().unwrap())
            .collect();
        assert_eq!(
            errors,
            vec![
                "headerId is required",
                "hour must be a positive number",
                "productionUser.id is required",
                "achievedQty must be a non-negative number",
            ]
        );
    }

    #[tokio::test]
    async fn test_hourly_production_missing_header_is_404() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/hourly-productions",
            Some(serde_json::json!({
                "headerId": 99, "hour": 1, "achievedQty": 10,
                "productionUser": {"id": "prod-7"}
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Production header 99 not found");
    }

    #[tokio::test]
    async fn test_hourly_production_carry_over_flow() {
        let app = test_app();
        let header_id = create_header(&app).await;

        let first = send(
            &app,
            "POST",
            "/api/hourly-productions",
            Some(serde_json::json!({
                "headerId": header_id.to_string(), "hour": 1, "achievedQty": "90",
                "productionUser": {"id": "prod-7"}
            })),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["message"], "Hourly production record saved successfully");
        assert_eq!(first["data"]["dynamicTarget"], 100.0);

        let second = send(
            &app,
            "POST",
            "/api/hourly-productions",
            Some(serde_json::json!({
                "headerId": header_id, "hour": "2", "achievedQty": 100,
                "productionUser": {"id": "prod-7"}
            })),
        )
        .await;
        let second = body_json(second).await;
        assert_eq!(second["data"]["dynamicTarget"], 110.0);
        assert_eq!(second["data"]["varianceQty"], 10.0);

        let list = send(
            &app,
            "GET",
            &format!("/api/hourly-productions?headerId={}&productionUserId=prod-7", header_id),
            None,
        )
        .await;
        let list = body_json(list).await;
        let hours: Vec<i64> = list["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["hour"].as_i64().unwrap())
            .collect();
        assert_eq!(hours, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_list_hourly_productions_requires_header_id() {
        let app = test_app();
        let response = send(&app, "GET", "/api/hourly-productions", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "headerId is required");
    }

    #[tokio::test]
    async fn test_register_requires_all_fields() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/register",
            Some(serde_json::json!({"buyer": "B", "building": "A", "floor": "2", "line": "  "})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "All fields including created_by are required"
        );

        let response = send(
            &app,
            "POST",
            "/api/register",
            Some(serde_json::json!({
                "buyer": "B", "building": "A", "floor": "2", "line": "Line 4",
                "created_by": "qc-1"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["createdBy"], "qc-1");
        let id = body["data"]["id"].as_i64().unwrap();

        let list = body_json(send(&app, "GET", "/api/register?createdBy=qc-1", None).await).await;
        assert_eq!(list["count"], 1);

        let deleted = send(&app, "DELETE", &format!("/api/register/{}", id), None).await;
        assert_eq!(deleted.status(), StatusCode::OK);
        let missing = send(&app, "GET", &format!("/api/register/{}", id), None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inspection_top_accepts_created_by_author() {
        let app = test_app();
        let payload = serde_json::json!({
            "created_by": {"id": "qc-1", "user_name": "qc-line-4"},
            "reportDate": "2025-11-15",
            "building": " A ", "floor": "2", "line": "Line 4", "buyer": "B"
        });
        let first = body_json(send(&app, "POST", "/api/inspection-top", Some(payload.clone())).await).await;
        assert_eq!(first["data"]["building"], "A");
        assert_eq!(first["data"]["user"]["userName"], "qc-line-4");

        let second = body_json(send(&app, "POST", "/api/inspection-top", Some(payload)).await).await;
        assert_eq!(first["data"]["id"], second["data"]["id"]);

        let list = body_json(
            send(&app, "GET", "/api/inspection-top?userId=qc-1&date=2025-11-15", None).await,
        )
        .await;
        assert_eq!(list["count"], 1);
    }

    #[tokio::test]
    async fn test_inspection_top_rejects_missing_user_and_bad_date() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/inspection-top",
            Some(serde_json::json!({"line": "Line 4"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            "POST",
            "/api/inspection-top",
            Some(serde_json::json!({"userId": "qc-1", "userName": "n", "reportDate": "15/11/2025"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_inspection_top() {
        let app = test_app();
        let created = body_json(
            send(
                &app,
                "POST",
                "/api/inspection-top",
                Some(serde_json::json!({"userId": "qc-1", "userName": "qc-line-4", "line": "Line 4"})),
            )
            .await,
        )
        .await;
        assert_eq!(created["message"], "Top input saved.");
        let id = created["data"]["id"].as_i64().unwrap();

        let deleted = send(&app, "DELETE", &format!("/api/inspection-top/{}", id), None).await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let again = send(&app, "DELETE", &format!("/api/inspection-top/{}", id), None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(again).await["message"],
            format!("Inspection top input {} not found", id)
        );
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_envelope() {
        let app = test_app();

        let broken = send_raw(&app, "POST", "/api/hourly-inspections", "{\"userId\": ").await;
        assert_eq!(broken.status(), StatusCode::BAD_REQUEST);
        assert!(is_json(&broken));
        let body = body_json(broken).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("Failed to parse"));

        let wrong_shape = send(
            &app,
            "POST",
            "/api/hourly-productions",
            Some(serde_json::json!({"headerId": 1, "hour": 1, "productionUser": "p"})),
        )
        .await;
        assert_eq!(wrong_shape.status(), StatusCode::BAD_REQUEST);
        assert!(is_json(&wrong_shape));
        assert_eq!(body_json(wrong_shape).await["success"], false);

        let bad_id = send(&app, "GET", "/api/register/abc", None).await;
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
        assert!(is_json(&bad_id));
        let body = body_json(bad_id).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("abc"));

        let no_content_type = Request::builder()
            .method("POST")
            .uri("/api/media-links")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(no_content_type).await.unwrap();
        assert!(is_json(&response));
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_register_accepts_numeric_line_fields() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/register",
            Some(serde_json::json!({
                "buyer": "B", "building": "A", "floor": 2, "line": 4, "createdBy": "qc-1"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Record saved successfully");
        assert_eq!(body["data"]["floor"], "2");
        assert_eq!(body["data"]["line"], "4");
    }

    #[tokio::test]
    async fn test_update_inspection_top_not_found() {
        let app = test_app();
        let response = send(
            &app,
            "PUT",
            "/api/inspection-top/7",
            Some(serde_json::json!({"line": "Line 4"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_resolve_limit() {
        let limits = LimitsConfig::default();
        assert_eq!(resolve_limit(None, &limits), 50);
        assert_eq!(resolve_limit(Some("abc"), &limits), 50);
        assert_eq!(resolve_limit(Some("0"), &limits), 50);
        assert_eq!(resolve_limit(Some("10"), &limits), 10);
        assert_eq!(resolve_limit(Some("500"), &limits), 200);
    }

    #[tokio::test]
    async fn test_hourly_inspections_require_working_hour() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/hourly-inspections",
            Some(serde_json::json!({
                "userId": "qc-1", "userName": "qc-line-4",
                "entries": [{"hour": "", "inspectedQty": 10}]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0], "Please select Working Hour.");
        assert_eq!(body["message"], "Please select Working Hour.");
    }

    #[tokio::test]
    async fn test_hourly_inspections_reject_negative_counts() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/hourly-inspections",
            Some(serde_json::json!({
                "userId": "qc-1", "userName": "qc-line-4", "reportDate": "2025-11-15",
                "entries": [
                    {"hour": "1st Hour", "inspectedQty": 40, "passedQty": 40},
                    {"hour": "2nd Hour", "inspectedQty": -40, "passedQty": -5, "defectivePcs": -2,
                     "selectedDefects": [{"name": "Oil Stain", "quantity": -1}]}
                ]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let errors: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_str().unwrap())
            .collect();
        assert_eq!(
            errors,
            vec![
                "2nd Hour: inspectedQty must be a non-negative number",
                "2nd Hour: passedQty must be a non-negative number",
                "2nd Hour: defectivePcs must be a non-negative number",
                "2nd Hour: defect 'Oil Stain' quantity must be a non-negative number",
            ]
        );

        let stored = body_json(
            send(&app, "GET", "/api/hourly-inspections?userId=qc-1&date=2025-11-15", None).await,
        )
        .await;
        assert_eq!(stored["count"], 0, "nothing from a rejected batch is stored");
    }

    #[tokio::test]
    async fn test_hourly_inspections_reject_oversized_counts() {
        let app = test_app();
        let response = send(
            &app,
            "POST",
            "/api/hourly-inspections",
            Some(serde_json::json!({
                "userId": "qc-1", "userName": "qc-line-4",
                "entries": [{
                    "hour": 1, "inspectedQty": 10,
                    "selectedDefects": [
                        {"name": "Oil Stain", "quantity": 9e18},
                        {"name": "Open Seam", "quantity": 9e18}
                    ]
                }]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["errors"][0],
            "1st Hour: defect 'Oil Stain' quantity must not exceed 1000000"
        );
    }

    #[tokio::test]
    async fn test_nameless_defect_is_counted_as_unknown() {
        let app = test_app();
        let saved = send(
            &app,
            "POST",
            "/api/hourly-inspections",
            Some(serde_json::json!({
                "userId": "qc-1", "userName": "qc-line-4", "reportDate": "2025-11-15",
                "entries": [{"hour": 1, "inspectedQty": 20, "passedQty": 18, "defectivePcs": 2,
                             "selectedDefects": [{"quantity": 2}]}]
            })),
        )
        .await;
        assert_eq!(saved.status(), StatusCode::OK);

        let summary = body_json(
            send(&app, "GET", "/api/quality-summary?userName=qc-line-4&date=2025-11-15", None).await,
        )
        .await;
        assert_eq!(summary["data"]["defects"][0], "Unknown (2)");
    }

    #[tokio::test]
    async fn test_inspection_boards() {
        let app = test_app();
        let saved = send(
            &app,
            "POST",
            "/api/hourly-inspections",
            Some(serde_json::json!({
                "userId": "qc-1", "userName": "qc-line-4", "reportDate": "2025-11-15",
                "entries": [
                    {"hour": "1st Hour", "inspectedQty": "40", "passedQty": 38, "defectivePcs": 2,
                     "afterRepair": 1, "selectedDefects": [{"name": "Oil Stain", "quantity": "3"}]},
                    {"hour": "2nd Hour", "inspectedQty": 60, "passedQty": 58, "defectivePcs": 2,
                     "selectedDefects": [{"name": "Skip Stitch", "quantity": 1}]}
                ]
            })),
        )
        .await;
        assert_eq!(saved.status(), StatusCode::OK);
        let saved = body_json(saved).await;
        assert_eq!(saved["count"], 2);
        assert_eq!(saved["data"][0]["totalDefects"], 3);

        let summary = body_json(
            send(&app, "GET", "/api/quality-summary?userName=qc-line-4&date=2025-11-15", None).await,
        )
        .await;
        assert_eq!(summary["data"]["passingRatePct"], 96);
        assert_eq!(summary["data"]["rejectPct"], 4);
        assert_eq!(summary["data"]["overallDHUPct"], 4);
        assert_eq!(summary["data"]["defects"][0], "Oil Stain (3)");

        let board = body_json(
            send(&app, "GET", "/api/hourly-dashboard?userName=qc-line-4&date=2025-11-15", None).await,
        )
        .await;
        let columns = board["data"]["columns"].as_array().unwrap();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[0]["dhu"], "7.50%");
        assert_eq!(columns[2]["dhu"], "0%");

        let missing = send(&app, "GET", "/api/quality-summary", None).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_production_header_conflict_and_patch() {
        let app = test_app();
        let id = create_header(&app).await;

        let dup = send(
            &app,
            "POST",
            "/api/production-headers",
            Some(serde_json::json!({
                "headerDate": "2025-11-15",
                "productionUser": {"id": "prod-7"}
            })),
        )
        .await;
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let patched = send(
            &app,
            "PATCH",
            &format!("/api/production-headers/{}", id),
            Some(serde_json::json!({"manpowerPresent": 55, "qualityUser": {"userName": "qc-line-4"}})),
        )
        .await;
        assert_eq!(patched.status(), StatusCode::OK);
        let patched = body_json(patched).await;
        assert_eq!(patched["data"]["manpowerPresent"], 55.0);
        assert_eq!(patched["data"]["smv"], 1.2);
        assert_eq!(patched["data"]["productionUser"]["productionUserName"], "Rahim");

        let negative = send(
            &app,
            "PATCH",
            &format!("/api/production-headers/{}", id),
            Some(serde_json::json!({"smv": -1})),
        )
        .await;
        assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

        let found = body_json(
            send(
                &app,
                "GET",
                "/api/production-headers?productionUserId=prod-7&date=2025-11-15",
                None,
            )
            .await,
        )
        .await;
        assert_eq!(found["data"]["id"], id);

        let latest = body_json(send(&app, "GET", "/api/production-headers/latest", None).await).await;
        assert_eq!(latest["data"]["id"], id);

        let none = body_json(
            send(
                &app,
                "GET",
                "/api/production-headers?productionUserId=prod-7&date=2025-11-16",
                None,
            )
            .await,
        )
        .await;
        assert!(none["data"].is_null());
    }

    #[tokio::test]
    async fn test_media_links_lifecycle() {
        let app = test_app();

        let missing = send(&app, "GET", "/api/media-links", None).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let empty = body_json(send(&app, "GET", "/api/media-links?userId=qc-1", None).await).await;
        assert!(empty["data"].is_null());

        let patch_missing = send(
            &app,
            "PATCH",
            "/api/media-links",
            Some(serde_json::json!({"userId": "qc-1", "imageSrc": "x"})),
        )
        .await;
        assert_eq!(patch_missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(patch_missing).await["message"],
            "Media links not found. Use POST to create."
        );

        let body = serde_json::json!({"userId": "qc-1", "userName": "qc-line-4", "imageSrc": "https://img"});
        let created = send(&app, "POST", "/api/media-links", Some(body.clone())).await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let dup = send(&app, "POST", "/api/media-links", Some(body)).await;
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(dup).await["message"],
            "Media links already exist. Use PATCH to update."
        );

        let patched = body_json(
            send(
                &app,
                "PATCH",
                "/api/media-links",
                Some(serde_json::json!({"userId": "qc-1", "videoSrc": "https://vid"})),
            )
            .await,
        )
        .await;
        assert_eq!(patched["data"]["imageSrc"], "");
        assert_eq!(patched["data"]["videoSrc"], "https://vid");
    }
}
