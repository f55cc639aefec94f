use anyhow::Result;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use canil_console::db;
use canil_console::dispatch::{Origin, UuidIds};
use canil_console::gateway::{GatewayTarget, MessageGateway, OutboundMessage};
use canil_console::model::{DogPatch, SettingsPatch};
use canil_console::scheduler::process_next_schedule;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Clone, Default)]
struct RecordingGateway {
    responses: Arc<Mutex<VecDeque<Result<()>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>, // (phone, body)
}

impl RecordingGateway {
    async fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl MessageGateway for RecordingGateway {
    async fn send_text(&self, _target: &GatewayTarget, msg: &OutboundMessage) -> Result<()> {
        self.calls
            .lock()
            .await
            .push((msg.phone.clone(), msg.body.clone()));
        self.responses.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

fn configured_target() -> GatewayTarget {
    GatewayTarget::new("https://gw.example.com/send", Some("secret".into()))
}

#[tokio::test]
async fn dog_catalog_crud_roundtrip() {
    let pool = setup_pool().await;

    let id = db::insert_dog(
        &pool,
        "Max",
        "Golden Retriever",
        "2 anos",
        "Um companheiro leal.",
        "https://picsum.photos/seed/max/400/400",
    )
    .await
    .unwrap();

    let dogs = db::list_dogs(&pool).await.unwrap();
    assert_eq!(dogs.len(), 1);
    assert_eq!(dogs[0].id, id);
    assert_eq!(dogs[0].name, "Max");

    // Partial update keeps untouched fields.
    let patch = DogPatch {
        age: Some("3 anos".into()),
        ..Default::default()
    };
    db::update_dog(&pool, &id, &patch).await.unwrap();
    let dog = db::find_dog(&pool, &id).await.unwrap().unwrap();
    assert_eq!(dog.age, "3 anos");
    assert_eq!(dog.breed, "Golden Retriever");

    assert!(db::delete_dog(&pool, &id).await.unwrap());
    assert!(!db::delete_dog(&pool, &id).await.unwrap());
    assert!(db::list_dogs(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn seed_fills_only_an_empty_catalog() {
    let pool = setup_pool().await;

    assert_eq!(db::seed_dogs(&pool).await.unwrap(), 6);
    assert_eq!(db::seed_dogs(&pool).await.unwrap(), 0);

    let dogs = db::list_dogs(&pool).await.unwrap();
    assert_eq!(dogs.len(), 6);
    assert!(dogs.iter().any(|d| d.name == "Rocky" && d.breed == "Vira-lata Caramelo"));
}

#[tokio::test]
async fn clients_get_unique_opaque_ids() {
    let pool = setup_pool().await;

    let a = db::insert_client(&pool, "Ana", "(11) 99999-9999").await.unwrap();
    let b = db::insert_client(&pool, "Bruno", "11 98888-7777").await.unwrap();
    assert_ne!(a, b);

    let clients = db::list_clients(&pool).await.unwrap();
    assert_eq!(clients.len(), 2);
    // Stored verbatim; normalization happens at dispatch time.
    assert_eq!(clients[0].phone, "(11) 99999-9999");

    assert!(db::delete_client(&pool, &a).await.unwrap());
    assert_eq!(db::list_clients(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn schedule_recipient_ids_survive_client_deletion() {
    let pool = setup_pool().await;

    let a = db::insert_client(&pool, "Ana", "11999999999").await.unwrap();
    let send_at = Utc::now() + Duration::hours(1);
    let schedule_id = db::insert_schedule(&pool, &[a.clone()], "Olá!", send_at)
        .await
        .unwrap();

    db::delete_client(&pool, &a).await.unwrap();

    // The dangling reference is tolerated; listings resolve it later.
    let schedules = db::list_schedules(&pool).await.unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].id, schedule_id);
    assert_eq!(schedules[0].client_ids, vec![a]);
    assert!(schedules[0].sent_at.is_none());
}

#[tokio::test]
async fn settings_save_merges_over_existing_row() {
    let pool = setup_pool().await;

    let empty = db::read_settings(&pool).await.unwrap();
    assert_eq!(empty, SettingsPatch::default());

    db::save_settings(
        &pool,
        &SettingsPatch {
            whatsapp_number: Some("5512981371613".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    db::save_settings(
        &pool,
        &SettingsPatch {
            gateway_url: Some("https://gw.example.com/send".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let stored = db::read_settings(&pool).await.unwrap();
    assert_eq!(stored.whatsapp_number.as_deref(), Some("5512981371613"));
    assert_eq!(
        stored.gateway_url.as_deref(),
        Some("https://gw.example.com/send")
    );
    assert_eq!(stored.gateway_token, None);
}

#[tokio::test]
async fn due_schedule_is_dispatched_and_marked_sent_once() {
    let pool = setup_pool().await;
    let gateway = RecordingGateway::default();

    let ana = db::insert_client(&pool, "Ana", "(11) 99999-9999").await.unwrap();
    let bruno = db::insert_client(&pool, "Bruno", "11 98888-7777").await.unwrap();
    db::delete_client(&pool, &bruno).await.unwrap();
    let mute = db::insert_client(&pool, "Sem Telefone", "---").await.unwrap();

    let now = Utc::now();
    db::insert_schedule(
        &pool,
        &[ana, bruno, mute],
        "Olá! Novidades no canil.",
        now - Duration::minutes(5),
    )
    .await
    .unwrap();

    let processed = process_next_schedule(
        &pool,
        &gateway,
        &UuidIds,
        &configured_target(),
        Origin::Plain,
        now,
    )
    .await
    .unwrap();
    assert!(processed);

    // Only the deliverable recipient got a call.
    let calls = gateway.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ("11999999999".into(), "Olá! Novidades no canil.".into()));

    let schedules = db::list_schedules(&pool).await.unwrap();
    assert!(schedules[0].sent_at.is_some());

    // A second sweep finds nothing due.
    let processed = process_next_schedule(
        &pool,
        &gateway,
        &UuidIds,
        &configured_target(),
        Origin::Plain,
        now,
    )
    .await
    .unwrap();
    assert!(!processed);
    assert_eq!(gateway.calls().await.len(), 1);
}

#[tokio::test]
async fn future_schedule_is_left_alone() {
    let pool = setup_pool().await;
    let gateway = RecordingGateway::default();

    let ana = db::insert_client(&pool, "Ana", "11999999999").await.unwrap();
    let now = Utc::now();
    db::insert_schedule(&pool, &[ana], "Olá!", now + Duration::hours(1))
        .await
        .unwrap();

    let processed = process_next_schedule(
        &pool,
        &gateway,
        &UuidIds,
        &configured_target(),
        Origin::Plain,
        now,
    )
    .await
    .unwrap();
    assert!(!processed);
    assert!(gateway.calls().await.is_empty());
}

#[tokio::test]
async fn unconfigured_gateway_leaves_the_schedule_due() {
    let pool = setup_pool().await;
    let gateway = RecordingGateway::default();

    let ana = db::insert_client(&pool, "Ana", "11999999999").await.unwrap();
    let now = Utc::now();
    db::insert_schedule(&pool, &[ana], "Olá!", now - Duration::minutes(1))
        .await
        .unwrap();

    let unconfigured = GatewayTarget::new("", None);
    let err = process_next_schedule(&pool, &gateway, &UuidIds, &unconfigured, Origin::Plain, now)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dispatch refused"));
    assert!(gateway.calls().await.is_empty());

    // Still due: a later sweep with a configured gateway delivers it.
    let processed = process_next_schedule(
        &pool,
        &gateway,
        &UuidIds,
        &configured_target(),
        Origin::Plain,
        now,
    )
    .await
    .unwrap();
    assert!(processed);
    assert_eq!(gateway.calls().await.len(), 1);
}

#[tokio::test]
async fn schedule_with_only_dangling_recipients_is_retired() {
    let pool = setup_pool().await;
    let gateway = RecordingGateway::default();

    let ghost = db::insert_client(&pool, "Ana", "11999999999").await.unwrap();
    db::delete_client(&pool, &ghost).await.unwrap();
    let now = Utc::now();
    db::insert_schedule(&pool, &[ghost], "Olá!", now - Duration::minutes(1))
        .await
        .unwrap();

    let processed = process_next_schedule(
        &pool,
        &gateway,
        &UuidIds,
        &configured_target(),
        Origin::Plain,
        now,
    )
    .await
    .unwrap();
    assert!(processed);
    assert!(gateway.calls().await.is_empty());
    assert!(db::list_schedules(&pool).await.unwrap()[0].sent_at.is_some());
}
