use axum::{extract::{Path, State}, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use crate::api::dtos::requests::{RescheduleNotificationRequest, SendEmailRequest};
use crate::api::dtos::responses::{RescheduleNotificationResponse, SendEmailResponse, SentEmail};
use crate::api::extractors::auth::AuthActor;
use crate::domain::models::job::EmailEvent;
use crate::domain::services::templates::EmailTemplate;
use crate::error::AppError;
use crate::state::AppState;

/// Renders one template with caller data and sends it to a single address.
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    // Any signed-in role may call this; the extractor only enforces authentication.
    AuthActor(_auth): AuthActor,
    Path(kind): Path<String>,
    Json(payload): Json<SendEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let template = EmailTemplate::from_slug(&kind)
        .ok_or_else(|| AppError::Validation(format!("Unknown email type '{}'", kind)))?;
    let to = payload.to
        .map(|to| to.trim().to_string())
        .filter(|to| !to.is_empty())
        .ok_or(AppError::Validation("Missing recipient".into()))?;
    if !to.contains('@') {
        return Err(AppError::Validation(format!("Invalid recipient '{}'", to)));
    }

    let mut data = payload.data.unwrap_or_else(|| json!({}));
    let Value::Object(fields) = &mut data else {
        return Err(AppError::Validation("data must be a JSON object".into()));
    };
    if let Some(name) = payload.user_name {
        fields.insert("user_name".into(), Value::String(name));
    }

    let rendered = state.renderer.render(template, &data)?;
    state.email_service.send(&to, &rendered.subject, &rendered.html).await
        .map_err(|e| match e {
            AppError::EmailDelivery(_) => e,
            other => AppError::EmailDelivery(other.to_string()),
        })?;

    info!("Sent {} email to {}", template.slug(), to);
    Ok(Json(SendEmailResponse {
        success: true,
        data: SentEmail { to, template: template.slug().to_string(), subject: rendered.subject },
    }))
}

/// Synchronous reschedule fan-out. Per-recipient failures are reported, not raised.
pub async fn reschedule_notification(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(appointment_id): Path<String>,
    Json(payload): Json<RescheduleNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.booking_service.find_for(&appointment_id, &actor).await?;

    let report = state.email_dispatcher
        .dispatch(EmailEvent::Reschedule, &appointment_id, payload.changes.as_ref(), None)
        .await;
    if report.has_failures() {
        warn!("Reschedule emails for {} partially failed: {:?}", appointment_id, report);
    }

    Ok(Json(RescheduleNotificationResponse { success: true, details: report }))
}
