// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::{I18nStore, DEFAULT_LANGUAGE};

// Idioma da requisição, já restrito aos catálogos conhecidos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANGUAGE.to_string())
    }
}

impl Locale {
    /// Primeiro idioma do Accept-Language que o catálogo suporta ("pt-BR" -> "pt").
    pub fn negotiate(header_value: &str, store: &I18nStore) -> Self {
        accept_language::parse(header_value)
            .iter()
            .map(|tag| tag.split('-').next().unwrap_or(tag).to_lowercase())
            .find(|lang| store.supports(lang))
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .map(|raw| Locale::negotiate(raw, I18nStore::global()))
            .unwrap_or_default();

        Ok(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_dropped() {
        let store = I18nStore::load().unwrap();
        assert_eq!(Locale::negotiate("pt-BR,pt;q=0.9", &store), Locale("pt".into()));
    }

    #[test]
    fn unsupported_languages_are_skipped() {
        let store = I18nStore::load().unwrap();
        assert_eq!(Locale::negotiate("de-DE,pt;q=0.5", &store), Locale("pt".into()));
        assert_eq!(Locale::negotiate("fr", &store), Locale::default());
    }
}
