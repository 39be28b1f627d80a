//! Routes for tenancies and their rent schedules.
//!
//! Every handler that returns a due date reads it through `TenancyService`, which
//! rolls lapsed dates forward before they are serialized.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::tenancy::{CreateTenancy, Tenancy, UpdateSchedule};
use serde::Deserialize;
use services::services::tenancy::UpcomingDueDates;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_UPCOMING: usize = 6;

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub count: Option<usize>,
}

/// POST /api/tenancies
pub async fn create_tenancy(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateTenancy>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Tenancy>>), ApiError> {
    let tenancy = state.tenancies().create(payload, state.today()).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(tenancy))))
}

/// GET /api/tenancies/{id}
pub async fn get_tenancy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Tenancy>>, ApiError> {
    let tenancy = state.tenancies().get(id, state.today()).await?;
    Ok(ResponseJson(ApiResponse::success(tenancy)))
}

/// PUT /api/tenancies/{id}/schedule
/// Replace the rent schedule; the due date is recomputed from scratch
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateSchedule>,
) -> Result<ResponseJson<ApiResponse<Tenancy>>, ApiError> {
    let tenancy = state
        .tenancies()
        .update_schedule(id, payload, state.today())
        .await?;
    Ok(ResponseJson(ApiResponse::success(tenancy)))
}

/// DELETE /api/tenancies/{id}
pub async fn delete_tenancy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.tenancies().delete(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/tenancies/{id}/upcoming?count=N
pub async fn get_upcoming(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UpcomingQuery>,
) -> Result<ResponseJson<ApiResponse<UpcomingDueDates>>, ApiError> {
    let count = query.count.unwrap_or(DEFAULT_UPCOMING);
    let upcoming = state.tenancies().upcoming(id, count, state.today()).await?;
    Ok(ResponseJson(ApiResponse::success(upcoming)))
}

/// GET /api/landlords/{landlord_id}/tenancies
pub async fn list_landlord_tenancies(
    State(state): State<AppState>,
    Path(landlord_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Tenancy>>>, ApiError> {
    let tenancies = state
        .tenancies()
        .list_for_landlord(landlord_id, state.today())
        .await?;
    Ok(ResponseJson(ApiResponse::success(tenancies)))
}

/// GET /api/tenants/{tenant_id}/tenancies
pub async fn list_tenant_tenancies(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Tenancy>>>, ApiError> {
    let tenancies = state
        .tenancies()
        .list_for_tenant(tenant_id, state.today())
        .await?;
    Ok(ResponseJson(ApiResponse::success(tenancies)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenancies", post(create_tenancy))
        .route("/tenancies/{id}", get(get_tenancy).delete(delete_tenancy))
        .route("/tenancies/{id}/schedule", put(update_schedule))
        .route("/tenancies/{id}/upcoming", get(get_upcoming))
        .route(
            "/landlords/{landlord_id}/tenancies",
            get(list_landlord_tenancies),
        )
        .route("/tenants/{tenant_id}/tenancies", get(list_tenant_tenancies))
}
