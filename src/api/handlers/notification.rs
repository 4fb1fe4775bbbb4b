use axum::{
    extract::{Path, Query, State},
    response::{sse::{Event, KeepAlive, Sse}, IntoResponse},
    http::StatusCode,
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};
use tracing::{debug, info};
use crate::api::dtos::requests::ListNotificationsQuery;
use crate::api::dtos::responses::{MarkedReadResponse, UnreadCountResponse};
use crate::api::extractors::auth::AuthActor;
use crate::domain::models::notification::Notification;
use crate::error::AppError;
use crate::state::AppState;

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = state.notification_service.list(actor.id(), query.limit).await?;
    Ok(Json(items))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> Result<impl IntoResponse, AppError> {
    let unread_count = state.notification_service.unread_count(actor.id()).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state.notification_service.mark_read(actor.id(), &notification_id).await?;
    Ok(Json(MarkedReadResponse { success: true, updated: changed as u64 }))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.notification_service.mark_all_read(actor.id()).await?;
    Ok(Json(MarkedReadResponse { success: true, updated }))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.notification_service.delete(actor.id(), &notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent events carrying the caller's new notifications. Opening a second
/// stream for the same user closes the first one.
pub async fn stream_notifications(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<Notification>();
    let handle = state.realtime.subscribe(actor.id(), Arc::new(move |notification: Notification| {
        // A closed receiver means the client already went away.
        let _ = tx.send(notification);
    }));
    info!("Realtime stream opened for {}", actor.id());

    let events = UnboundedReceiverStream::new(rx).map(move |notification| {
        // The handle lives as long as the stream; dropping it unsubscribes.
        let _subscription = &handle;
        let event = Event::default()
            .event("notification")
            .id(notification.id.clone())
            .json_data(&notification)
            .unwrap_or_else(|e| {
                debug!("Skipping unserializable notification: {}", e);
                Event::default().comment("skipped")
            });
        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
