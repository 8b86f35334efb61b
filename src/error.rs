use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;

/// Ошибки HTTP-слоя. Тело ответа всегда `{success: false, message}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // остальные ошибки реестра - это испорченная статическая таблица
            AppError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoothId;

    #[test]
    fn status_mapping() {
        let id = BoothId::parse("99").unwrap();
        assert_eq!(AppError::Registry(RegistryError::NotFound(id)).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Registry(RegistryError::InvalidId("1x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
