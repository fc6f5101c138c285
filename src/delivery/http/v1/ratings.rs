use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::platform::Platform;
use crate::domain::rating::Rating;
use crate::domain::submission::RatingSubmission;
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Serialize)]
pub struct SubmitRatingResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a rating. The rater's email is never exposed.
#[derive(Serialize)]
pub struct RatingResponse {
    pub id: Uuid,
    pub score: i16,
    pub comment: Option<String>,
    pub rater_name: Option<String>,
    pub proof_ref: Option<String>,
    pub source: Platform,
    pub deal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Rating> for RatingResponse {
    fn from(rating: Rating) -> Self {
        Self {
            id: rating.id,
            score: rating.score,
            comment: rating.comment,
            rater_name: rating.rater_name,
            proof_ref: rating.proof_ref,
            source: rating.source,
            deal_id: rating.deal_id,
            created_at: rating.created_at,
        }
    }
}

#[tracing::instrument(skip(state, payload))]
pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RatingSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling submit rating request");

    let submitted = match payload {
        Ok(Json(payload)) => {
            let source = payload.source();
            state.ratings_usecase.submit_rating(payload).await.map(|rating| (rating, source))
        }
        Err(rejection) => Err(rejection.into()),
    };
    let (rating, source) = match submitted {
        Ok(submitted) => submitted,
        Err(e) => {
            metrics::counter!("ratings_rejected_total", "reason" => e.kind()).increment(1);
            return Err(e);
        }
    };

    metrics::counter!("ratings_submitted_total", "source" => source.as_str()).increment(1);

    tracing::debug!(rating_id = %rating.id, "rating submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmitRatingResponse {
            id: rating.id,
            customer_id: rating.customer_id,
            deal_id: rating.deal_id,
            created_at: rating.created_at,
        }),
    ))
}

#[tracing::instrument(skip(state), fields(%subject))]
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list ratings request");

    let ratings = state.ratings_usecase.list_for_subject(&subject).await?;
    let response: Vec<RatingResponse> = ratings.into_iter().map(RatingResponse::from).collect();

    tracing::debug!(count = response.len(), "ratings listed");
    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state), fields(%subject))]
pub async fn get_average(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling rating average request");

    let summary = state.ratings_usecase.average_for_subject(&subject).await?;

    tracing::debug!(average = summary.average, count = summary.count, "rating average retrieved");
    Ok((StatusCode::OK, Json(summary)))
}
