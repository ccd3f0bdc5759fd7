// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "en";

// Catálogos embutidos no binário
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("pt", include_str!("../../locales/pt.json")),
];

/// Catálogo de mensagens por idioma: idioma -> (código -> mensagem).
#[derive(Debug, Clone)]
pub struct I18nStore {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Catálogo '{}' inválido: {}", lang, e))?;
            catalogs.insert((*lang).to_string(), messages);
        }
        Ok(Self { catalogs })
    }

    /// Instância compartilhada (usada quando não há AppState por perto).
    pub fn global() -> &'static I18nStore {
        static STORE: OnceLock<I18nStore> = OnceLock::new();
        STORE.get_or_init(|| {
            I18nStore::load().unwrap_or_else(|e| {
                tracing::error!("🔥 Falha ao carregar catálogos de idioma: {}", e);
                I18nStore { catalogs: HashMap::new() }
            })
        })
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.catalogs.contains_key(lang)
    }

    /// Busca a mensagem no idioma pedido, cai para o inglês e, por último, devolve o próprio código.
    pub fn translate(&self, lang: &str, code: &str, args: &[(&str, &str)]) -> String {
        let template = self
            .catalogs
            .get(lang)
            .and_then(|c| c.get(code))
            .or_else(|| self.catalogs.get(DEFAULT_LANGUAGE).and_then(|c| c.get(code)));

        let Some(template) = template else {
            return code.to_string();
        };

        args.iter().fold(template.clone(), |msg, (key, value)| {
            msg.replace(&format!("{{{}}}", key), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_parses_and_has_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let en = &store.catalogs["en"];
        let pt = &store.catalogs["pt"];
        for key in en.keys() {
            assert!(pt.contains_key(key), "pt sem a chave {}", key);
        }
    }

    #[test]
    fn placeholders_are_filled() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate("en", "common.not_found", &[("entity", "Lead")]);
        assert_eq!(msg, "Lead not found");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate("de", "lead.duplicate", &[]);
        assert_eq!(msg, store.translate("en", "lead.duplicate", &[]));
    }

    #[test]
    fn unknown_code_is_returned_verbatim() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("en", "nope.nothing", &[]), "nope.nothing");
    }
}
