use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorResponse, StoreError};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => match e {
                StoreError::BatchNotFound(_)
                | StoreError::ImageNotFound(_)
                | StoreError::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
                StoreError::DuplicateBatch(_)
                | StoreError::ImageLocked(_)
                | StoreError::ImageNotProcessed(_)
                | StoreError::ImageDeleted(_)
                | StoreError::ConnectionInactive(_) => StatusCode::CONFLICT,
            },
            ApiError::Storage(e) => match e {
                StorageError::InvalidFormat | StorageError::FileTooLarge => StatusCode::BAD_REQUEST,
                StorageError::InvalidKey(_) | StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::S3(_) | StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = if status.is_server_error() {
            log::error!("Request failed: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorResponse { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn missing_batch_is_404() {
        let (status, json) = body_of(StoreError::BatchNotFound("b1".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Batch not found: b1");
    }

    #[actix_web::test]
    async fn locked_image_is_409() {
        let (status, _) = body_of(StoreError::ImageLocked("i1".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn internal_errors_are_sanitized() {
        let (status, json) = body_of(ApiError::Internal("bucket credentials".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "An internal error occurred");
    }
}
