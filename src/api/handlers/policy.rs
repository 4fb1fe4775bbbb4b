use axum::{extract::{Path, Query, State}, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use crate::api::dtos::requests::{BookingAllowedQuery, UpdatePolicyRequest};
use crate::api::dtos::responses::PolicyResponse;
use crate::api::extractors::auth::AuthActor;
use crate::domain::models::{actor::Actor, business::Business};
use crate::error::AppError;
use crate::state::AppState;

/// Clients ask about themselves; owners may ask about any client of their business.
pub async fn booking_allowed(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(business_id): Path<String>,
    Query(query): Query<BookingAllowedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let client_id = match &actor {
        Actor::Client(id) => {
            if query.client_id.as_deref().is_some_and(|requested| requested != id) {
                return Err(AppError::Forbidden("Clients can only check their own booking status".into()));
            }
            id.clone()
        }
        Actor::BusinessOwner(owner_id) => {
            owned_business(&state, &business_id, owner_id).await?;
            query.client_id.ok_or(AppError::Validation("client_id is required".into()))?
        }
    };

    let status = state.policy_service.check_client_booking_allowed(&client_id, &business_id, Utc::now()).await?;
    Ok(Json(status))
}

pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    // Any signed-in role may call this; the extractor only enforces authentication.
    AuthActor(_auth): AuthActor,
    Path(business_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let business = state.business_repo.find_business(&business_id).await?
        .ok_or(AppError::NotFound("Business not found".into()))?;
    Ok(Json(PolicyResponse { business_id: business.id.clone(), policy: business.policy() }))
}

pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(business_id): Path<String>,
    Json(payload): Json<UpdatePolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Actor::BusinessOwner(owner_id) = &actor else {
        return Err(AppError::Forbidden("Only the business can change its cancellation policy".into()));
    };
    let business = owned_business(&state, &business_id, owner_id).await?;

    let mut policy = business.policy();
    if let Some(allow) = payload.allow_client_cancellation {
        policy.allow_client_cancellation = allow;
    }
    if let Some(hours) = payload.min_hours_notice {
        if hours < 0 {
            return Err(AppError::Validation("min_hours_notice cannot be negative".into()));
        }
        policy.min_hours_notice = hours;
    }
    if let Some(max) = payload.max_monthly_cancellations {
        if max < 0 {
            return Err(AppError::Validation("max_monthly_cancellations cannot be negative".into()));
        }
        policy.max_monthly_cancellations = max;
    }

    let updated = state.business_repo.update_policy(&business.id, &policy).await?;
    info!("Cancellation policy updated for business {}", updated.id);
    Ok(Json(PolicyResponse { business_id: updated.id.clone(), policy: updated.policy() }))
}

async fn owned_business(state: &AppState, business_id: &str, owner_id: &str) -> Result<Business, AppError> {
    let business = state.business_repo.find_business(business_id).await?
        .ok_or(AppError::NotFound("Business not found".into()))?;
    if !business.is_owned_by(owner_id) {
        return Err(AppError::Forbidden("You do not manage this business".into()));
    }
    Ok(business)
}
