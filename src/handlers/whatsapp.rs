// src/handlers/whatsapp.rs

use std::collections::HashMap;

use axum::{
    extract::{Form, State},
    http::header,
    response::IntoResponse,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    services::whatsapp_service::InboundMessage,
};

// Twilio aceita qualquer 200; TwiML vazio = nenhuma resposta automática
const EMPTY_TWIML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>";

/// Campos do formulário do Twilio: MessageSid, From, Body, NumMedia, MediaUrl0..n.
pub fn parse_twilio_form(form: &HashMap<String, String>) -> Result<InboundMessage, AppError> {
    let field = |name: &'static str| {
        form.get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::MissingField(name))
    };

    let message_sid = field("MessageSid")?;
    let from = field("From")?;
    let body = form.get("Body").cloned().filter(|b| !b.trim().is_empty());

    let num_media = match form.get("NumMedia") {
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| AppError::InvalidField("NumMedia"))?,
        None => 0,
    };
    let media_urls = (0..num_media)
        .filter_map(|i| form.get(&format!("MediaUrl{}", i)).cloned())
        .collect();

    Ok(InboundMessage { message_sid, from, body, media_urls })
}

#[utoipa::path(
    post,
    path = "/api/whatsapp/webhook",
    tag = "WhatsApp",
    request_body(content = HashMap<String, String>, content_type = "application/x-www-form-urlencoded", description = "Campos do webhook do Twilio"),
    responses(
        (status = 200, description = "Mensagem registrada (TwiML vazio)", content_type = "text/xml"),
        (status = 400, description = "MessageSid ou From ausente")
    )
)]
pub async fn webhook(
    State(app_state): State<AppState>,
    locale: Locale,
    Form(form): Form<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let message = parse_twilio_form(&form).map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let stored = app_state
        .whatsapp_service
        .receive(message)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    if let Some(stored) = stored {
        tracing::info!("💬 WhatsApp {} de {} registrado", stored.message_sid, stored.from_number);
    }

    Ok(([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn media_urls_follow_num_media() {
        let message = parse_twilio_form(&form(&[
            ("MessageSid", "SM1"),
            ("From", "whatsapp:+971501234567"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://api.twilio.com/m/0"),
            ("MediaUrl1", "https://api.twilio.com/m/1"),
            ("MediaUrl2", "https://api.twilio.com/m/ignored"),
        ]))
        .unwrap();

        assert_eq!(message.media_urls.len(), 2);
        assert!(message.body.is_none());
    }

    #[test]
    fn sid_is_required() {
        let err = parse_twilio_form(&form(&[("From", "whatsapp:+971501234567")])).unwrap_err();
        assert!(matches!(err, AppError::MissingField("MessageSid")));
    }

    #[test]
    fn bad_media_count_is_rejected() {
        let err = parse_twilio_form(&form(&[
            ("MessageSid", "SM1"),
            ("From", "whatsapp:+971501234567"),
            ("NumMedia", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidField("NumMedia")));
    }
}
