use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::repository::errors::RepositoryError;

#[derive(Debug, Error)]
pub enum UsecaseError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Counterparty email matches the rated subject")]
    SubjectMismatch,

    #[error("This deal has already been rated by you")]
    DuplicateDeal,

    #[error("You already rated this person in the last 24 hours")]
    Duplicate24h,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UsecaseError::NotFound(_) => "not_found",
            UsecaseError::Validation(_) => "validation",
            UsecaseError::SubjectMismatch => "subject_mismatch",
            UsecaseError::DuplicateDeal => "duplicate_deal",
            UsecaseError::Duplicate24h => "duplicate_24h",
            UsecaseError::Conflict(_) => "conflict",
            UsecaseError::Internal(_) => "internal",
        }
    }
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => UsecaseError::NotFound("Resource".to_string()),
            RepositoryError::Conflict(msg) => UsecaseError::Conflict(msg),
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
        }
    }
}

/// Bodies that do not deserialize are reported like any other invalid input.
impl From<JsonRejection> for UsecaseError {
    fn from(rejection: JsonRejection) -> Self {
        UsecaseError::Validation(format!("body: {}", rejection.body_text()))
    }
}

impl IntoResponse for UsecaseError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            UsecaseError::NotFound(_) => StatusCode::NOT_FOUND,
            UsecaseError::Validation(_) => StatusCode::BAD_REQUEST,
            UsecaseError::SubjectMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            UsecaseError::DuplicateDeal | UsecaseError::Duplicate24h | UsecaseError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            UsecaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            UsecaseError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
            }
            UsecaseError::NotFound(_) => {
                tracing::warn!(error = %self, "resource not found");
            }
            UsecaseError::SubjectMismatch => {
                tracing::warn!(error = %self, "subject mismatch");
            }
            _ => {
                tracing::debug!(error = %self);
            }
        }

        // Storage details stay in the logs.
        let body = match &self {
            UsecaseError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
        Json,
    };

    use crate::domain::submission::RatingSubmission;

    async fn extract(body: &'static str) -> Result<RatingSubmission, UsecaseError> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/ratings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let Json(payload) = Json::<RatingSubmission>::from_request(request, &()).await?;
        Ok(payload)
    }

    #[test]
    fn test_repository_errors_map_to_kinds() {
        let e: UsecaseError = RepositoryError::DatabaseError("connection reset".to_string()).into();
        assert_eq!(e.kind(), "internal");

        let e: UsecaseError = RepositoryError::Conflict("customers_subject_key".to_string()).into();
        assert_eq!(e.kind(), "conflict");

        let e: UsecaseError = RepositoryError::NotFound.into();
        assert_eq!(e.kind(), "not_found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UsecaseError::Validation("rating: range".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(UsecaseError::SubjectMismatch.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(UsecaseError::DuplicateDeal.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(UsecaseError::Duplicate24h.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            UsecaseError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_undeserializable_body_is_a_validation_error() {
        for body in [
            r#"{"subject": "alice@example.com", "rating": 4.5}"#,
            r#"{"subject": "alice@example.com", "rating": 70000}"#,
            r#"{"rating": 4}"#,
            r#"{"subject": "alice@example.com", "#,
        ] {
            let error = extract(body).await.unwrap_err();

            assert_eq!(error.kind(), "validation", "body {body}");
            assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_named() {
        let error = extract(r#"{"rating": 4}"#).await.unwrap_err();

        assert!(error.to_string().contains("subject"));
    }

    #[tokio::test]
    async fn test_well_formed_body_reaches_validation() {
        let payload = extract(r#"{"subject": "alice@example.com", "rating": 9}"#).await.unwrap();

        assert_eq!(payload.rating, 9);
    }
}
