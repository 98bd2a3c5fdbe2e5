// 🌐 HTTP API - ledger reads/writes plus person and group plumbing

use crate::db::{self, NewPerson, Person, PersonUpdate, Store};
use crate::error::LedgerError;
use crate::ledger::{self, MonthStatus};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Store,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// LedgerError mapped onto an HTTP status
struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Storage(e) => {
                tracing::error!(error = %e, "storage failure while serving API request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Unwrap a JSON body, turning a malformed one into a validation error
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, reason: &str) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(%rejection, "rejected request body");
            Err(ApiError(LedgerError::validation(reason)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct PersonFilter {
    group: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted_persons: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub month_index: i64,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment_id: i64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/groups - Distinct group names
async fn get_groups(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let conn = state.store.connect()?;
    Ok(Json(ApiResponse::ok(db::list_groups(&conn)?)))
}

/// DELETE /api/groups/:name - Remove a whole group
async fn remove_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<DeletedResponse> {
    let conn = state.store.connect()?;
    let deleted_persons = db::delete_group(&conn, &name)?;
    Ok(Json(ApiResponse::ok(DeletedResponse { deleted_persons })))
}

/// GET /api/persons?group= - List persons
async fn get_persons(
    State(state): State<AppState>,
    Query(filter): Query<PersonFilter>,
) -> ApiResult<Vec<Person>> {
    let conn = state.store.connect()?;
    let persons = db::list_persons(&conn, filter.group.as_deref())?;
    Ok(Json(ApiResponse::ok(persons)))
}

/// POST /api/persons - Register a person
async fn create_person(
    State(state): State<AppState>,
    payload: Result<Json<NewPerson>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedResponse>>), ApiError> {
    let person = json_body(payload, "invalid person record")?;
    let conn = state.store.connect()?;
    let id = db::insert_person(&conn, &person)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreatedResponse { id })),
    ))
}

/// PUT /api/persons/:id - Partial update
async fn edit_person(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
    payload: Result<Json<PersonUpdate>, JsonRejection>,
) -> ApiResult<Person> {
    let update = json_body(payload, "invalid person update")?;
    let conn = state.store.connect()?;
    let person = db::update_person(&conn, person_id, &update)?;
    Ok(Json(ApiResponse::ok(person)))
}

/// DELETE /api/persons/:id - Remove a person and its payments
async fn remove_person(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
) -> ApiResult<()> {
    let conn = state.store.connect()?;
    db::delete_person(&conn, person_id)?;
    Ok(Json(ApiResponse::ok(())))
}

/// GET /api/persons/:id/payments - Month index -> status
async fn get_payments(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
) -> ApiResult<BTreeMap<u8, MonthStatus>> {
    let conn = state.store.connect()?;
    let schedule = ledger::payment_schedule(&conn, person_id)?;
    Ok(Json(ApiResponse::ok(schedule)))
}

/// POST /api/persons/:id/payments - Upsert one month slot
async fn record_payment(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> ApiResult<PaymentResponse> {
    let request = json_body(payload, "month_index and amount must be integers")?;
    let conn = state.store.connect()?;
    let payment_id = ledger::set_payment(&conn, person_id, request.month_index, request.amount)?;
    Ok(Json(ApiResponse::ok(PaymentResponse { payment_id })))
}

/// Router for everything under /api
pub fn router(store: Store) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/groups", get(get_groups))
        .route("/groups/:name", delete(remove_group))
        .route("/persons", get(get_persons).post(create_person))
        .route("/persons/:id", put(edit_person).delete(remove_person))
        .route(
            "/persons/:id/payments",
            get(get_payments).post(record_payment),
        )
        .with_state(AppState { store });

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
