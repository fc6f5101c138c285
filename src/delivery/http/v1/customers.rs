use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::submission::{first_validation_error, validate_optional_email};
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct RegisterCustomerRequest {
    #[validate(length(min = 1, max = 320))]
    pub subject: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub address_line: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
}

/// The credential never leaves the service.
#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub subject: String,
    pub claimed: bool,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        let claimed = customer.is_claimed();
        let profile = customer.profile;
        Self {
            id: customer.id,
            subject: customer.subject,
            claimed,
            email: profile.email,
            full_name: profile.full_name,
            phone: profile.phone,
            address_line: profile.address_line,
            postal_code: profile.postal_code,
            city: profile.city,
            created_at: customer.created_at,
        }
    }
}

#[tracing::instrument(skip(state, payload))]
pub async fn register_customer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterCustomerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling register customer request");

    let Json(payload) = payload?;

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(first_validation_error(&validation_errors)));
    }

    let profile = CustomerProfile {
        email: payload.email,
        full_name: payload.full_name,
        phone: payload.phone,
        address_line: payload.address_line,
        postal_code: payload.postal_code,
        city: payload.city,
    };

    let registration = state
        .customers_usecase
        .register(&payload.subject, &payload.password, profile)
        .await?;

    let kind = if registration.upgraded { "claimed" } else { "new" };
    metrics::counter!("customers_registered_total", "kind" => kind).increment(1);

    tracing::debug!(customer_id = %registration.customer.id, kind, "customer registered");
    Ok((
        StatusCode::CREATED,
        Json(CustomerResponse::from(registration.customer)),
    ))
}

#[tracing::instrument(skip(state), fields(%subject))]
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get customer request");

    let customer = state.customers_usecase.get_customer(&subject).await?;

    Ok((StatusCode::OK, Json(CustomerResponse::from(customer))))
}
