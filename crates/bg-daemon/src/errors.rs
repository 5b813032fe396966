//! §7 error-kind → HTTP status mapping, shared by every handler in `routes`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api_types::ErrorBody;

pub fn store_error_response(err: bg_store::StoreError) -> Response {
    let (status, msg) = match &err {
        bg_store::StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        bg_store::StoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        bg_store::StoreError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        bg_store::StoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    (status, Json(ErrorBody::new(msg))).into_response()
}

pub fn queue_error_response(err: bg_queue::QueueError) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string()))).into_response()
}

pub fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = bg_store::StoreError::NotFound { entity: "session", id: "x".into() };
        let resp = store_error_response(err);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp = store_error_response(bg_store::StoreError::Conflict("already terminal".into()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_400() {
        let resp = store_error_response(bg_store::StoreError::Validation("bad input".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
