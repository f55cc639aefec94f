use super::model::ScheduleRow;
use crate::model::{Client, Dog, DogPatch, ScheduledMessage, SettingsPatch};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

// --- dogs ---

#[instrument(skip_all)]
pub async fn list_dogs(pool: &Pool) -> Result<Vec<Dog>> {
    let rows = sqlx::query(
        "SELECT id, name, breed, age, description, image_url, created_at \
         FROM dogs ORDER BY created_at, rowid",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| Dog {
            id: row.get("id"),
            name: row.get("name"),
            breed: row.get("breed"),
            age: row.get("age"),
            description: row.get("description"),
            image_url: row.get("image_url"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn insert_dog(
    pool: &Pool,
    name: &str,
    breed: &str,
    age: &str,
    description: &str,
    image_url: &str,
) -> Result<String> {
    let id = new_document_id();
    sqlx::query(
        "INSERT INTO dogs (id, name, breed, age, description, image_url, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(breed)
    .bind(age)
    .bind(description)
    .bind(image_url)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

/// Partial update: `None` fields keep their stored value.
#[instrument(skip_all)]
pub async fn update_dog(pool: &Pool, id: &str, patch: &DogPatch) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE dogs SET \
           name = COALESCE(?, name), \
           breed = COALESCE(?, breed), \
           age = COALESCE(?, age), \
           description = COALESCE(?, description), \
           image_url = COALESCE(?, image_url) \
         WHERE id = ?",
    )
    .bind(patch.name.as_deref())
    .bind(patch.breed.as_deref())
    .bind(patch.age.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.image_url.as_deref())
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(anyhow!("dog {} not found", id));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_dog(pool: &Pool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM dogs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Seed the starter catalog into an empty dogs table. Returns how many
/// entries were inserted (zero when the catalog already has content).
#[instrument(skip_all)]
pub async fn seed_dogs(pool: &Pool) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dogs")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(0);
    }
    let seeds = crate::model::initial_dogs();
    let mut inserted = 0;
    for dog in &seeds {
        insert_dog(
            pool,
            dog.name.as_deref().unwrap_or_default(),
            dog.breed.as_deref().unwrap_or_default(),
            dog.age.as_deref().unwrap_or_default(),
            dog.description.as_deref().unwrap_or_default(),
            dog.image_url.as_deref().unwrap_or_default(),
        )
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

#[instrument(skip_all)]
pub async fn find_dog(pool: &Pool, id: &str) -> Result<Option<Dog>> {
    let row = sqlx::query(
        "SELECT id, name, breed, age, description, image_url, created_at \
         FROM dogs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| Dog {
        id: row.get("id"),
        name: row.get("name"),
        breed: row.get("breed"),
        age: row.get("age"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
    }))
}

// --- clients ---

#[instrument(skip_all)]
pub async fn list_clients(pool: &Pool) -> Result<Vec<Client>> {
    let rows =
        sqlx::query("SELECT id, name, phone, created_at FROM clients ORDER BY created_at, rowid")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| Client {
            id: row.get("id"),
            name: row.get("name"),
            phone: row.get("phone"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn find_client(pool: &Pool, id: &str) -> Result<Option<Client>> {
    let row = sqlx::query("SELECT id, name, phone, created_at FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| Client {
        id: row.get("id"),
        name: row.get("name"),
        phone: row.get("phone"),
        created_at: row.get("created_at"),
    }))
}

#[instrument(skip_all)]
pub async fn insert_client(pool: &Pool, name: &str, phone: &str) -> Result<String> {
    let id = new_document_id();
    sqlx::query("INSERT INTO clients (id, name, phone, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(phone)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn delete_client(pool: &Pool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM clients WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

// --- schedules ---

#[instrument(skip_all)]
pub async fn list_schedules(pool: &Pool) -> Result<Vec<ScheduledMessage>> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, client_ids, message, send_at, sent_at, created_at \
         FROM schedules ORDER BY send_at, rowid",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ScheduleRow::into_schedule).collect()
}

#[instrument(skip_all)]
pub async fn insert_schedule(
    pool: &Pool,
    client_ids: &[String],
    message: &str,
    send_at: DateTime<Utc>,
) -> Result<String> {
    let id = new_document_id();
    sqlx::query(
        "INSERT INTO schedules (id, client_ids, message, send_at, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(serde_json::to_string(client_ids)?)
    .bind(message)
    .bind(send_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn delete_schedule(pool: &Pool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM schedules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Oldest schedule that is due and not yet sent.
#[instrument(skip_all)]
pub async fn next_due_schedule(
    pool: &Pool,
    now: DateTime<Utc>,
) -> Result<Option<ScheduledMessage>> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, client_ids, message, send_at, sent_at, created_at \
         FROM schedules WHERE sent_at IS NULL AND send_at <= ? \
         ORDER BY send_at, rowid LIMIT 1",
    )
    .bind(now)
    .fetch_optional(pool)
    .await?;
    row.map(ScheduleRow::into_schedule).transpose()
}

#[instrument(skip_all)]
pub async fn mark_schedule_sent(pool: &Pool, id: &str, at: DateTime<Utc>) -> Result<()> {
    let updated = sqlx::query("UPDATE schedules SET sent_at = ? WHERE id = ? AND sent_at IS NULL")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(anyhow!("schedule {} not found or already sent", id));
    }
    Ok(())
}

// --- settings ---

/// The stored settings row; all fields empty when nothing was saved yet.
#[instrument(skip_all)]
pub async fn read_settings(pool: &Pool) -> Result<SettingsPatch> {
    let row = sqlx::query(
        "SELECT whatsapp_number, gateway_url, gateway_token FROM settings WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(match row {
        Some(row) => SettingsPatch {
            whatsapp_number: row.get("whatsapp_number"),
            gateway_url: row.get("gateway_url"),
            gateway_token: row.get("gateway_token"),
        },
        None => SettingsPatch::default(),
    })
}

/// Merge-save: fields left `None` keep their stored value. There is
/// exactly one live settings row.
#[instrument(skip_all)]
pub async fn save_settings(pool: &Pool, patch: &SettingsPatch) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (id, whatsapp_number, gateway_url, gateway_token) \
         VALUES (1, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
           whatsapp_number = COALESCE(excluded.whatsapp_number, settings.whatsapp_number), \
           gateway_url = COALESCE(excluded.gateway_url, settings.gateway_url), \
           gateway_token = COALESCE(excluded.gateway_token, settings.gateway_token)",
    )
    .bind(patch.whatsapp_number.as_deref())
    .bind(patch.gateway_url.as_deref())
    .bind(patch.gateway_token.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_url_passthrough() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/db"),
            "postgres://localhost/db"
        );
    }

    #[test]
    fn sqlite_url_keeps_query_string() {
        let url = prepare_sqlite_url("sqlite:///tmp/canil-test/app.db?mode=rwc");
        assert_eq!(url, "sqlite:///tmp/canil-test/app.db?mode=rwc");
    }
}
