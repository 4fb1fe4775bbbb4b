use axum::{body::Bytes, extract::{Path, State}, response::IntoResponse, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;
use crate::api::dtos::requests::{
    BookAppointmentRequest, CancelAppointmentRequest, RescheduleRequest, UpdateStatusRequest,
};
use crate::api::dtos::responses::{AppointmentResponse, CanCancelResponse};
use crate::api::extractors::auth::AuthActor;
use crate::domain::models::actor::Actor;
use crate::domain::services::booking::{BookingClient, NewBooking, NewSchedule};
use crate::domain::services::policy::PolicyVerdict;
use crate::error::AppError;
use crate::state::AppState;

pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(business_id): Path<String>,
    Json(payload): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = match (payload.client_id, payload.walk_in) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation("Provide either a client or a walk-in, not both".into()));
        }
        (Some(client_id), None) => Some(BookingClient::Registered(client_id)),
        (None, Some(walk_in)) => {
            if walk_in.full_name.trim().is_empty() {
                return Err(AppError::Validation("Walk-in name is required".into()));
            }
            Some(BookingClient::WalkIn { full_name: walk_in.full_name, phone: walk_in.phone })
        }
        (None, None) => None,
    };

    let request = NewBooking {
        employee_id: payload.employee_id,
        date: payload.date,
        start_time: payload.start_time,
        end_time: payload.end_time,
        services: payload.services,
        client,
        notes: payload.notes,
    };

    let appointment = state.booking_service.book(&business_id, &actor, request).await?;
    Ok((StatusCode::CREATED, Json(AppointmentResponse::ok(appointment))))
}

pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let appointment = state.booking_service.find_for(&appointment_id, &actor).await?;
    Ok(Json(appointment))
}

pub async fn can_cancel(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let verdict = state.cancellation_service.can_cancel(&appointment_id, &actor).await?;
    let response = match verdict {
        PolicyVerdict::Allowed => CanCancelResponse { allowed: true, reason: None },
        PolicyVerdict::Denied(reason) => CanCancelResponse { allowed: false, reason: Some(reason) },
    };
    Ok(Json(response))
}

pub async fn cancel_by_client(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let Actor::Client(_) = actor else {
        return Err(AppError::Forbidden("Use the business cancellation endpoint".into()));
    };
    let reason = cancel_reason(&body)?;

    let cancelled = state.cancellation_service.cancel(&appointment_id, &actor, reason.as_deref()).await?;
    info!("Appointment {} cancelled by client", cancelled.id);
    Ok(Json(AppointmentResponse::ok(cancelled)))
}

pub async fn cancel_by_business(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let Actor::BusinessOwner(_) = actor else {
        return Err(AppError::Forbidden("Only the business can use this endpoint".into()));
    };
    let reason = cancel_reason(&body)?;

    let cancelled = state.cancellation_service.cancel(&appointment_id, &actor, reason.as_deref()).await?;
    info!("Appointment {} cancelled by business", cancelled.id);
    Ok(Json(AppointmentResponse::ok(cancelled)))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.booking_service.transition(&appointment_id, &actor, payload.status).await?;
    Ok(Json(AppointmentResponse::ok(updated)))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let schedule = NewSchedule {
        date: payload.date,
        start_time: payload.start_time,
        end_time: payload.end_time,
        employee_id: payload.employee_id,
    };
    let moved = state.booking_service.reschedule(&appointment_id, &actor, schedule).await?;
    Ok(Json(AppointmentResponse::ok(moved)))
}

/// The cancel body is optional; an empty request means no reason.
fn cancel_reason(body: &Bytes) -> Result<Option<String>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: CancelAppointmentRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid cancel request: {}", e)))?;
    Ok(request.reason.filter(|r| !r.trim().is_empty()))
}
