//! Maps `RouteError` to HTTP status codes and JSON error bodies for the
//! diagnostic endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use switchboard_types::{RouteError, RouteErrorKind};

pub struct AppError(pub RouteError);

impl From<RouteError> for AppError {
    fn from(e: RouteError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            RouteErrorKind::NoRoute => StatusCode::NOT_FOUND,
            RouteErrorKind::ForwardLoop => StatusCode::UNPROCESSABLE_ENTITY,
            RouteErrorKind::Forbidden => StatusCode::FORBIDDEN,
            RouteErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RouteErrorKind::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RouteErrorKind::Gone => StatusCode::GONE,
            RouteErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        };
        let body = json!({
            "error": self.0.kind.as_str(),
            "detail": self.0.detail,
        });
        (status, Json(body)).into_response()
    }
}
