use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::tenancy::TenancyError;
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tenancy(#[from] TenancyError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Tenancy(TenancyError::Schedule(e)) if e.is_invalid_schedule() => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Tenancy(TenancyError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Tenancy(TenancyError::NotFound) => {
                (StatusCode::NOT_FOUND, "Tenancy not found".to_string())
            }
            ApiError::Tenancy(TenancyError::Schedule(e)) => {
                error!(error = %e, "Due date computation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Tenancy(TenancyError::Database(e)) | ApiError::Database(e) => {
                error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
