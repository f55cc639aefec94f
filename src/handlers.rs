//! Console command implementations: thin glue between the store, the
//! dispatch loop and the external service clients.
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::dispatch::{self, DispatchRequest, Origin, Recipient, UuidIds};
use crate::gateway::{GatewayTarget, HttpGateway};
use crate::model::{DogPatch, Settings, SettingsPatch};
use crate::phone;
use crate::suggest::{GeminiClient, SuggestionService, SUGGESTION_FALLBACK};

/// Stored settings row merged over the configured defaults.
pub async fn effective_settings(pool: &db::Pool, cfg: &Config) -> Result<Settings> {
    let stored = db::read_settings(pool).await?;
    Ok(Settings::effective(&stored, cfg))
}

// --- catalog ---

pub async fn list_dogs(pool: &db::Pool) -> Result<()> {
    let dogs = db::list_dogs(pool).await?;
    if dogs.is_empty() {
        println!("No dogs in the catalog.");
        return Ok(());
    }
    for dog in dogs {
        println!("{}  {} ({}, {})", dog.id, dog.name, dog.breed, dog.age);
        println!("    {}", dog.description);
        println!("    {}", dog.image_url);
    }
    Ok(())
}

pub async fn add_dog(
    pool: &db::Pool,
    name: &str,
    breed: &str,
    age: &str,
    description: &str,
    image_url: &str,
) -> Result<()> {
    let id = db::insert_dog(pool, name, breed, age, description, image_url).await?;
    println!("Added dog {id}.");
    Ok(())
}

pub async fn update_dog(pool: &db::Pool, id: &str, patch: &DogPatch) -> Result<()> {
    db::update_dog(pool, id, patch).await?;
    println!("Updated dog {id}.");
    Ok(())
}

pub async fn delete_dog(pool: &db::Pool, id: &str) -> Result<()> {
    if db::delete_dog(pool, id).await? {
        println!("Deleted dog {id}.");
    } else {
        println!("Dog {id} not found.");
    }
    Ok(())
}

pub async fn seed_catalog(pool: &db::Pool) -> Result<()> {
    let inserted = db::seed_dogs(pool).await?;
    if inserted == 0 {
        println!("Catalog already has entries; nothing seeded.");
    } else {
        println!("Seeded {inserted} dogs into the catalog.");
    }
    Ok(())
}

// --- clients ---

pub async fn list_clients(pool: &db::Pool) -> Result<()> {
    let clients = db::list_clients(pool).await?;
    if clients.is_empty() {
        println!("No clients registered.");
        return Ok(());
    }
    for client in clients {
        println!("{}  {}  {}", client.id, client.name, client.phone);
    }
    Ok(())
}

pub async fn add_client(pool: &db::Pool, name: &str, phone_raw: &str) -> Result<()> {
    if phone::digits_only(phone_raw).is_empty() {
        return Err(anyhow!("client phone must contain at least one digit"));
    }
    let id = db::insert_client(pool, name, phone_raw).await?;
    println!("Added client {id}.");
    Ok(())
}

pub async fn delete_client(pool: &db::Pool, id: &str) -> Result<()> {
    if db::delete_client(pool, id).await? {
        println!("Deleted client {id}.");
    } else {
        println!("Client {id} not found.");
    }
    Ok(())
}

// --- schedules ---

pub async fn list_schedules(pool: &db::Pool) -> Result<()> {
    let schedules = db::list_schedules(pool).await?;
    if schedules.is_empty() {
        println!("No scheduled messages.");
        return Ok(());
    }
    let clients = db::list_clients(pool).await?;
    let names: HashMap<String, String> = clients
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    for schedule in schedules {
        let recipients = schedule
            .client_ids
            .iter()
            .map(|id| names.get(id).map(String::as_str).unwrap_or("unknown"))
            .collect::<Vec<_>>()
            .join(", ");
        let state = match schedule.sent_at {
            Some(at) => format!("sent {}", at.to_rfc3339()),
            None => "pending".to_string(),
        };
        println!(
            "{}  at {}  [{}]  to: {}",
            schedule.id,
            schedule.send_at.to_rfc3339(),
            state,
            recipients
        );
        println!("    \"{}\"", schedule.message);
    }
    Ok(())
}

/// Accepts RFC 3339 (`2026-08-07T15:30:00Z`) or a bare local-style
/// `2026-08-07T15:30`, which is taken as UTC.
pub fn parse_send_at(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|_| anyhow!("invalid send time '{raw}': expected RFC 3339 or YYYY-MM-DDTHH:MM"))?;
    Ok(naive.and_utc())
}

pub async fn add_schedule(
    pool: &db::Pool,
    client_ids: &[String],
    message: &str,
    send_at_raw: &str,
) -> Result<()> {
    if client_ids.is_empty() {
        return Err(anyhow!("select at least one client"));
    }
    if message.trim().is_empty() {
        return Err(anyhow!("message must be non-empty"));
    }
    let send_at = parse_send_at(send_at_raw)?;
    for client_id in client_ids {
        if db::find_client(pool, client_id).await?.is_none() {
            return Err(anyhow!("unknown client {client_id}"));
        }
    }
    let id = db::insert_schedule(pool, client_ids, message, send_at).await?;
    println!("Scheduled message {id} for {}.", send_at.to_rfc3339());
    Ok(())
}

pub async fn delete_schedule(pool: &db::Pool, id: &str) -> Result<()> {
    if db::delete_schedule(pool, id).await? {
        println!("Deleted schedule {id}.");
    } else {
        println!("Schedule {id} not found.");
    }
    Ok(())
}

// --- settings ---

pub async fn show_settings(pool: &db::Pool, cfg: &Config) -> Result<()> {
    let settings = effective_settings(pool, cfg).await?;
    println!("whatsapp number: {}", settings.whatsapp_number);
    println!(
        "gateway url:     {}",
        if settings.gateway_url.is_empty() {
            "(not configured)"
        } else {
            settings.gateway_url.as_str()
        }
    );
    println!(
        "gateway token:   {}",
        if settings.gateway_token.is_empty() {
            "(not set)"
        } else {
            "[REDACTED]"
        }
    );
    Ok(())
}

pub async fn save_settings(pool: &db::Pool, patch: &SettingsPatch) -> Result<()> {
    if patch.whatsapp_number.is_none() && patch.gateway_url.is_none() && patch.gateway_token.is_none()
    {
        return Err(anyhow!("nothing to save: pass at least one setting"));
    }
    db::save_settings(pool, patch).await?;
    println!("Settings saved.");
    Ok(())
}

// --- bulk dispatch ---

/// Resolve the selection into dispatch recipients, dropping clients whose
/// phone has no digits.
async fn resolve_recipients(
    pool: &db::Pool,
    all: bool,
    client_ids: &[String],
) -> Result<Vec<Recipient>> {
    let clients = if all {
        db::list_clients(pool).await?
    } else {
        let mut selected = Vec::new();
        for id in client_ids {
            match db::find_client(pool, id).await? {
                Some(client) => selected.push(client),
                None => return Err(anyhow!("unknown client {id}")),
            }
        }
        selected
    };

    Ok(clients
        .into_iter()
        .filter(|c| {
            let eligible = !phone::digits_only(&c.phone).is_empty();
            if !eligible {
                warn!(client = %c.name, "client has no usable phone; skipping");
            }
            eligible
        })
        .map(|c| Recipient {
            id: c.id,
            name: c.name,
            phone: c.phone,
        })
        .collect())
}

pub async fn send_bulk(
    pool: &db::Pool,
    cfg: &Config,
    all: bool,
    client_ids: &[String],
    message: &str,
) -> Result<()> {
    let settings = effective_settings(pool, cfg).await?;
    let recipients = resolve_recipients(pool, all, client_ids).await?;

    let request = DispatchRequest {
        recipients,
        body: message.to_string(),
        target: GatewayTarget::new(settings.gateway_url, Some(settings.gateway_token)),
        origin: Origin::from_require_tls(cfg.gateway.require_tls),
    };
    let gateway = HttpGateway::new(Duration::from_secs(cfg.gateway.timeout_seconds));
    let report = match dispatch::run(&gateway, &UuidIds, &request).await {
        Ok(report) => report,
        Err(err) => {
            println!("Dispatch refused: {err}");
            return Ok(());
        }
    };

    println!(
        "Sent to {} of {} client(s).",
        report.succeeded, report.attempted
    );
    if !report.failed.is_empty() {
        println!("Failed: {}", report.failed.join(", "));
    }
    Ok(())
}

// --- suggestions ---

pub async fn suggest_idea(cfg: &Config) -> Result<()> {
    let client = GeminiClient::new(cfg.suggest.api_key.clone(), cfg.suggest.model.clone());
    match client.message_idea().await {
        Ok(idea) => println!("{idea}"),
        Err(err) => {
            warn!(?err, "suggestion failed");
            println!("{SUGGESTION_FALLBACK}");
        }
    }
    Ok(())
}

// --- public lead flows ---

/// Deep link for the single-dog interest flow, against the configured
/// outreach number.
pub async fn interest_link(
    pool: &db::Pool,
    cfg: &Config,
    dog_id: &str,
    name: &str,
    lead_phone: &str,
) -> Result<()> {
    let dog = db::find_dog(pool, dog_id)
        .await?
        .ok_or_else(|| anyhow!("unknown dog {dog_id}"))?;
    let settings = effective_settings(pool, cfg).await?;
    let message = phone::interest_message(&dog.name, &dog.breed, name, lead_phone);
    println!("{}", phone::wa_link(&settings.whatsapp_number, &message)?);
    Ok(())
}

/// Deep link for the general inquiry flow.
pub async fn inquiry_link(
    pool: &db::Pool,
    cfg: &Config,
    name: &str,
    lead_phone: &str,
) -> Result<()> {
    let settings = effective_settings(pool, cfg).await?;
    let message = phone::inquiry_message(name, lead_phone);
    println!("{}", phone::wa_link(&settings.whatsapp_number, &message)?);
    Ok(())
}
