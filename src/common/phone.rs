// src/common/phone.rs

// Normalização de números para o formato canônico dos Emirados (+971...)

const UAE_PREFIX: &str = "971";

/// Converte um número para `+971XXXXXXXXX`. Devolve `None` quando o formato não é reconhecido.
///
/// Regras:
/// - `971` + 9 dígitos (12 no total) ganha o `+` na frente;
/// - `0` + 9 dígitos (10 no total) troca o `0` por `+971`;
/// - `+971` + 9 dígitos passa direto;
/// - qualquer outra coisa é rejeitada.
pub fn normalize_uae_phone(raw: &str) -> Option<String> {
    // Remove separadores comuns de planilha ("050 123-4567", "(050)...")
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if let Some(rest) = cleaned.strip_prefix('+') {
        let is_canonical = rest.len() == 12
            && rest.starts_with(UAE_PREFIX)
            && rest.chars().all(|c| c.is_ascii_digit());
        return is_canonical.then(|| cleaned.clone());
    }

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    if cleaned.starts_with(UAE_PREFIX) {
        return (cleaned.len() == 12).then(|| format!("+{}", cleaned));
    }

    if cleaned.len() == 10 && cleaned.starts_with('0') {
        return Some(format!("+{}{}", UAE_PREFIX, &cleaned[1..]));
    }

    None
}

/// Números vindos do Twilio chegam como `whatsapp:+971...`.
pub fn strip_whatsapp_prefix(raw: &str) -> &str {
    raw.trim().strip_prefix("whatsapp:").unwrap_or(raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mobile_gets_country_code() {
        assert_eq!(normalize_uae_phone("0501234567").as_deref(), Some("+971501234567"));
    }

    #[test]
    fn bare_country_code_gets_plus() {
        assert_eq!(normalize_uae_phone("971501234567").as_deref(), Some("+971501234567"));
    }

    #[test]
    fn canonical_number_is_left_untouched() {
        assert_eq!(normalize_uae_phone("+971501234567").as_deref(), Some("+971501234567"));
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["0501234567", "971501234567", "+971 50 123 4567", "050-123-4567"] {
            let once = normalize_uae_phone(raw).unwrap();
            let twice = normalize_uae_phone(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn short_country_code_numbers_are_rejected() {
        assert_eq!(normalize_uae_phone("97150"), None);
        assert_eq!(normalize_uae_phone("9715012345678"), None);
    }

    #[test]
    fn accepted_output_normalizes_to_itself() {
        let inputs = [
            "97150", "971", "9715012345", "971501234567", "9715012345678",
            "0501234567", "050123456", "+971501234567", "+97150", "(050) 123.4567",
        ];
        for raw in inputs {
            if let Some(once) = normalize_uae_phone(raw) {
                assert_eq!(normalize_uae_phone(&once).as_deref(), Some(once.as_str()), "entrada {raw}");
            }
        }
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(normalize_uae_phone(" 050 123-4567 ").as_deref(), Some("+971501234567"));
    }

    #[test]
    fn foreign_and_garbage_numbers_are_rejected() {
        assert_eq!(normalize_uae_phone("+441234567890"), None);
        assert_eq!(normalize_uae_phone("12345"), None);
        assert_eq!(normalize_uae_phone("05012345"), None);
        assert_eq!(normalize_uae_phone("abc0501234567"), None);
        assert_eq!(normalize_uae_phone(""), None);
        assert_eq!(normalize_uae_phone("+97150123456"), None);
    }

    #[test]
    fn whatsapp_prefix_is_stripped() {
        assert_eq!(strip_whatsapp_prefix("whatsapp:+971501234567"), "+971501234567");
        assert_eq!(strip_whatsapp_prefix("+971501234567"), "+971501234567");
    }
}
