//! Phone normalization and WhatsApp deep links for the public lead flows.
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid regex"));

/// Strip every non-digit character, preserving digit order.
pub fn digits_only(phone: &str) -> String {
    NON_DIGIT.replace_all(phone, "").into_owned()
}

/// Build a `wa.me` deep link that opens a chat with `phone` pre-filled
/// with `text`. No response is ever observed for these links; success is
/// assumed once the navigation is opened.
pub fn wa_link(phone: &str, text: &str) -> Result<String> {
    let digits = digits_only(phone);
    let mut url = Url::parse(&format!("https://wa.me/{digits}"))
        .with_context(|| format!("invalid WhatsApp number: {phone}"))?;
    url.query_pairs_mut().append_pair("text", text);
    Ok(url.into())
}

/// Lead message for the single-dog interest flow.
pub fn interest_message(dog_name: &str, breed: &str, name: &str, phone: &str) -> String {
    format!(
        "Olá! Tenho interesse no cãozinho {dog_name} ({breed}). Meu nome é {name} e meu telefone é {phone}."
    )
}

/// Lead message for the general inquiry flow.
pub fn inquiry_message(name: &str, phone: &str) -> String {
    format!("Olá! Gostei das raças e quero saber mais. Meu nome é {name} e meu telefone é {phone}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("(11) 99999-9999"), "11999999999");
        assert_eq!(digits_only("+55 12 98137-1613"), "5512981371613");
        assert_eq!(digits_only("tel: 11x9y1z2"), "119112");
        assert_eq!(digits_only("sem numero"), "");
    }

    #[test]
    fn digits_only_preserves_order() {
        assert_eq!(digits_only("1a2b3c4"), "1234");
    }

    #[test]
    fn wa_link_normalizes_and_encodes() {
        let url = wa_link("(11) 91234-5678", "Olá! Tudo bem?").unwrap();
        assert!(url.starts_with("https://wa.me/11912345678?text="));
        let parsed = Url::parse(&url).unwrap();
        let (key, value) = parsed.query_pairs().next().unwrap();
        assert_eq!(key, "text");
        assert_eq!(value, "Olá! Tudo bem?");
    }

    #[test]
    fn interest_message_mentions_dog_and_lead() {
        let msg = interest_message("Max", "Golden Retriever", "Ana", "11912345678");
        assert_eq!(
            msg,
            "Olá! Tenho interesse no cãozinho Max (Golden Retriever). Meu nome é Ana e meu telefone é 11912345678."
        );
    }

    #[test]
    fn inquiry_message_mentions_lead() {
        let msg = inquiry_message("Ana", "11912345678");
        assert!(msg.starts_with("Olá! Gostei das raças"));
        assert!(msg.contains("Ana"));
        assert!(msg.contains("11912345678"));
    }
}
