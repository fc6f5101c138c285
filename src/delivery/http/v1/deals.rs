use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::domain::platform::Platform;
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[tracing::instrument(skip(state), fields(%platform, %proof_ref))]
pub async fn get_deal(
    State(state): State<Arc<AppState>>,
    Path((platform, proof_ref)): Path<(String, String)>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get deal request");

    let platform = Platform::parse(&platform);
    if !platform.is_known() {
        return Err(UsecaseError::NotFound("Deal".to_string()));
    }

    let deal = state.ratings_usecase.deals().get_deal(platform, &proof_ref).await?;

    Ok((StatusCode::OK, Json(deal)))
}
