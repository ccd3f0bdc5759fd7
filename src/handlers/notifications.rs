// src/handlers/notifications.rs

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Serialize;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::activity::Notification,
    services::notification_service::{user_room, PushEnvelope},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    responses((status = 200, description = "Notificações do usuário, mais recentes primeiro", body = Vec<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = app_state
        .notification_service
        .list_for_user(user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(notifications))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses(
        (status = 200, description = "Notificação lida", body = Notification),
        (status = 404, description = "Não existe ou é de outro usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = app_state
        .notification_service
        .mark_read(id, user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(notification))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    responses((status = 200, description = "Todas marcadas como lidas", body = MarkAllReadResponse)),
    security(("api_jwt" = []))
)]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = app_state
        .notification_service
        .mark_all_read(user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Só os envelopes da sala do usuário viram eventos.
fn room_event(envelope: &PushEnvelope, room: &str) -> Option<Event> {
    if envelope.room != room {
        return None;
    }
    Event::default()
        .event("notification")
        .id(envelope.notification.id.to_string())
        .json_data(&envelope.notification)
        .ok()
}

#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    tag = "Notifications",
    responses((status = 200, description = "Server-Sent Events com as notificações da sala user_<id>", content_type = "text/event-stream")),
    security(("api_jwt" = []))
)]
pub async fn stream(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let room = user_room(user.id);
    tracing::debug!("📡 Assinante conectado na sala {}", room);

    let events = BroadcastStream::new(app_state.push_hub.subscribe()).filter_map(move |message| match message {
        Ok(envelope) => room_event(&envelope, &room).map(Ok),
        Err(e) => {
            // Assinante lento perdeu mensagens; elas continuam no banco
            tracing::warn!("⚠️ Stream de notificações atrasado: {}", e);
            None
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::EntityKind;
    use chrono::Utc;

    fn envelope(receiver_id: Uuid) -> PushEnvelope {
        PushEnvelope {
            room: user_room(receiver_id),
            notification: Notification {
                id: Uuid::new_v4(),
                receiver_id,
                sender_id: Uuid::new_v4(),
                message: "Deal collected".into(),
                reference_kind: EntityKind::Deal,
                reference_id: Uuid::new_v4(),
                is_read: false,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn other_rooms_are_filtered_out() {
        let me = Uuid::new_v4();
        assert!(room_event(&envelope(me), &user_room(me)).is_some());
        assert!(room_event(&envelope(Uuid::new_v4()), &user_room(me)).is_none());
    }
}
