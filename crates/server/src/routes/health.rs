use axum::{extract::State, response::Json as ResponseJson};
use serde::Serialize;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub today: chrono::NaiveDate,
}

/// GET /api/health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<HealthStatus>>, ApiError> {
    sqlx::query("SELECT 1").execute(&state.db().pool).await?;

    Ok(ResponseJson(ApiResponse::success(HealthStatus {
        status: "ok",
        today: state.today(),
    })))
}
