use axum::{
    body::Body,
    extract::Request,
    routing::{get, post, put, delete},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{health, appointment, policy, notification, email};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Booking & lifecycle
        .route("/api/v1/businesses/{business_id}/appointments", post(appointment::book_appointment))
        .route("/api/v1/appointments/{appointment_id}", get(appointment::get_appointment))
        .route("/api/v1/appointments/{appointment_id}/can-cancel", get(appointment::can_cancel))
        .route("/api/v1/appointments/{appointment_id}/cancel", post(appointment::cancel_by_client))
        .route("/api/v1/appointments/{appointment_id}/business-cancel", post(appointment::cancel_by_business))
        .route("/api/v1/appointments/{appointment_id}/status", put(appointment::update_status))
        .route("/api/v1/appointments/{appointment_id}/reschedule", put(appointment::reschedule_appointment))

        // Policy
        .route("/api/v1/businesses/{business_id}/booking-allowed", get(policy::booking_allowed))
        .route("/api/v1/businesses/{business_id}/cancellation-policy", get(policy::get_policy).put(policy::update_policy))

        // Notifications
        .route("/api/v1/notifications", get(notification::list_notifications))
        .route("/api/v1/notifications/unread-count", get(notification::unread_count))
        .route("/api/v1/notifications/read-all", post(notification::mark_all_read))
        .route("/api/v1/notifications/stream", get(notification::stream_notifications))
        .route("/api/v1/notifications/{notification_id}/read", post(notification::mark_read))
        .route("/api/v1/notifications/{notification_id}", delete(notification::delete_notification))

        // Email
        .route("/api/v1/emails/{kind}", post(email::send_email))
        .route("/api/v1/appointments/{appointment_id}/reschedule-notification", post(email::reschedule_notification))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        user_id = tracing::field::Empty,
                        role = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        // Browser clients call the email endpoints cross-origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
