use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tocarde_core::DomainError;
use tocarde_store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    Authentication(String),
    Domain(DomainError),
    NotFound(&'static str),
    Internal(anyhow::Error),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(e) => Self::Domain(e),
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Decode(msg) => Self::Internal(anyhow::anyhow!(msg)),
            StoreError::Database(e) => Self::Internal(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "errors": { "detail": msg } }),
            ),
            ApiError::Domain(err) => {
                let status = match err {
                    DomainError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    DomainError::InvalidState { .. } => StatusCode::BAD_REQUEST,
                    DomainError::CapacityExceeded { .. } | DomainError::Conflict { .. } => {
                        StatusCode::CONFLICT
                    }
                };
                (status, json!({ "errors": { err.field(): err.message() } }))
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "errors": { "detail": format!("{} not found", what) } }),
            ),
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "errors": { "detail": "internal server error" } }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (
                DomainError::forbidden("action", "nope"),
                StatusCode::FORBIDDEN,
            ),
            (
                DomainError::invalid_state("action", "already accepted"),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::capacity_exceeded("units", "full"),
                StatusCode::CONFLICT,
            ),
            (
                DomainError::conflict("requester", "duplicate"),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound("trip").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_authentication_maps_to_401() {
        let response = ApiError::Authentication("missing token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
