//! Domain models for the kennel catalog, client directory and scheduler.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// A dog in the public catalog. Identifiers are opaque and immutable once
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dog {
    pub id: String,
    pub name: String,
    pub breed: String,
    pub age: String,
    pub description: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Partial dog update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct DogPatch {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// A client in the directory. Clients are inserted and deleted, never
/// mutated in place. The phone is free text; it is normalized to digits
/// only at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// A message scheduled for a set of clients at a wall-clock instant.
/// Recipient ids may dangle after a client is deleted; listings resolve
/// those to "unknown".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub id: String,
    pub client_ids: Vec<String>,
    pub message: String,
    pub send_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Effective admin settings: the stored settings row merged over the
/// configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub whatsapp_number: String,
    pub gateway_url: String,
    pub gateway_token: String,
}

/// The stored settings row. All fields optional; a save merges the
/// provided fields over the existing row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub whatsapp_number: Option<String>,
    pub gateway_url: Option<String>,
    pub gateway_token: Option<String>,
}

impl Settings {
    /// Merge the stored row over the configured defaults. Empty stored
    /// fields fall back to the defaults.
    pub fn effective(stored: &SettingsPatch, cfg: &Config) -> Self {
        let pick = |stored: &Option<String>, default: &str| -> String {
            match stored {
                Some(v) if !v.trim().is_empty() => v.clone(),
                _ => default.to_string(),
            }
        };
        Settings {
            whatsapp_number: pick(&stored.whatsapp_number, &cfg.whatsapp.default_number),
            gateway_url: pick(&stored.gateway_url, &cfg.gateway.url),
            gateway_token: pick(&stored.gateway_token, &cfg.gateway.token),
        }
    }
}

/// Seed entries for a fresh catalog.
pub fn initial_dogs() -> Vec<DogPatch> {
    let entry = |name: &str, breed: &str, age: &str, description: &str, seed: &str| DogPatch {
        name: Some(name.into()),
        breed: Some(breed.into()),
        age: Some(age.into()),
        description: Some(description.into()),
        image_url: Some(format!("https://picsum.photos/seed/{seed}/400/400")),
    };
    vec![
        entry(
            "Max",
            "Golden Retriever",
            "2 anos",
            "Um companheiro leal e brincalhão, ótimo com crianças e outros animais. Adora buscar bolinhas.",
            "max",
        ),
        entry(
            "Bella",
            "Beagle",
            "1 ano e 6 meses",
            "Curiosa e cheia de energia, Bella é uma exploradora nata que vai encher sua casa de alegria.",
            "bella",
        ),
        entry(
            "Rocky",
            "Vira-lata Caramelo",
            "3 anos",
            "Um cãozinho inteligente e muito carinhoso. Rocky é a prova de que o amor não tem raça.",
            "rocky",
        ),
        entry(
            "Luna",
            "Shih Tzu",
            "4 anos",
            "Calma e afetuosa, Luna é a companhia perfeita para quem busca um amigo tranquilo para o sofá.",
            "luna",
        ),
        entry(
            "Toby",
            "Poodle",
            "8 meses",
            "Um filhote esperto e que aprende rápido. Toby está pronto para aprender truques e se divertir.",
            "toby",
        ),
        entry(
            "Kira",
            "Pastor Alemão",
            "2 anos",
            "Protetora e muito inteligente, Kira é uma cadela incrível para quem tem espaço e amor para dar.",
            "kira",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        serde_yaml::from_str(crate::config::example()).unwrap()
    }

    #[test]
    fn effective_settings_prefer_stored_values() {
        let stored = SettingsPatch {
            whatsapp_number: Some("5512981371613".into()),
            gateway_url: Some("https://gw.example.com/send".into()),
            gateway_token: None,
        };
        let cfg = sample_config();
        let settings = Settings::effective(&stored, &cfg);
        assert_eq!(settings.whatsapp_number, "5512981371613");
        assert_eq!(settings.gateway_url, "https://gw.example.com/send");
        assert_eq!(settings.gateway_token, cfg.gateway.token);
    }

    #[test]
    fn effective_settings_treat_blank_as_missing() {
        let stored = SettingsPatch {
            whatsapp_number: Some("   ".into()),
            ..Default::default()
        };
        let cfg = sample_config();
        let settings = Settings::effective(&stored, &cfg);
        assert_eq!(settings.whatsapp_number, cfg.whatsapp.default_number);
    }

    #[test]
    fn initial_dogs_cover_the_starter_catalog() {
        let dogs = initial_dogs();
        assert_eq!(dogs.len(), 6);
        assert_eq!(dogs[0].name.as_deref(), Some("Max"));
        assert!(dogs
            .iter()
            .all(|d| d.image_url.as_deref().unwrap().starts_with("https://picsum.photos/seed/")));
    }
}
