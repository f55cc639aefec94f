use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use canil_console::config::{self, Config};
use canil_console::db;
use canil_console::dispatch::{Origin, UuidIds};
use canil_console::gateway::{GatewayTarget, HttpGateway};
use canil_console::handlers;
use canil_console::model::{DogPatch, SettingsPatch};
use canil_console::scheduler;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the schedule sweep worker
    Serve,
    /// Manage the public dog catalog
    #[command(subcommand)]
    Catalog(CatalogCmd),
    /// Manage the client directory
    #[command(subcommand)]
    Client(ClientCmd),
    /// Manage scheduled messages
    #[command(subcommand)]
    Schedule(ScheduleCmd),
    /// Show or change the admin settings
    #[command(subcommand)]
    Settings(SettingsCmd),
    /// Send a message to selected clients through the messaging gateway
    Send {
        /// Send to every registered client
        #[arg(long, conflicts_with = "clients")]
        all: bool,
        /// Client id to send to (repeatable)
        #[arg(long = "client")]
        clients: Vec<String>,
        #[arg(long)]
        message: String,
    },
    /// Print an AI-generated outreach message idea
    Suggest,
    /// Print the WhatsApp deep link for a dog-interest lead
    Interest {
        #[arg(long)]
        dog: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    /// Print the WhatsApp deep link for a general inquiry lead
    Inquiry {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
}

#[derive(Debug, Subcommand)]
enum CatalogCmd {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        breed: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        image_url: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
    Delete {
        id: String,
    },
    /// Insert the starter catalog into an empty dogs collection
    Seed,
}

#[derive(Debug, Subcommand)]
enum ClientCmd {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum ScheduleCmd {
    List,
    Add {
        /// Client id to include (repeatable)
        #[arg(long = "client", required = true)]
        clients: Vec<String>,
        #[arg(long)]
        message: String,
        /// When to send: RFC 3339 or YYYY-MM-DDTHH:MM (UTC)
        #[arg(long)]
        send_at: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCmd {
    Show,
    Set {
        #[arg(long)]
        whatsapp_number: Option<String>,
        #[arg(long)]
        gateway_url: Option<String>,
        #[arg(long)]
        gateway_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/canil.db?mode=rwc", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        Command::Serve => serve(&pool, &cfg).await,
        Command::Catalog(cmd) => match cmd {
            CatalogCmd::List => handlers::list_dogs(&pool).await,
            CatalogCmd::Add {
                name,
                breed,
                age,
                description,
                image_url,
            } => handlers::add_dog(&pool, &name, &breed, &age, &description, &image_url).await,
            CatalogCmd::Update {
                id,
                name,
                breed,
                age,
                description,
                image_url,
            } => {
                let patch = DogPatch {
                    name,
                    breed,
                    age,
                    description,
                    image_url,
                };
                handlers::update_dog(&pool, &id, &patch).await
            }
            CatalogCmd::Delete { id } => handlers::delete_dog(&pool, &id).await,
            CatalogCmd::Seed => handlers::seed_catalog(&pool).await,
        },
        Command::Client(cmd) => match cmd {
            ClientCmd::List => handlers::list_clients(&pool).await,
            ClientCmd::Add { name, phone } => handlers::add_client(&pool, &name, &phone).await,
            ClientCmd::Delete { id } => handlers::delete_client(&pool, &id).await,
        },
        Command::Schedule(cmd) => match cmd {
            ScheduleCmd::List => handlers::list_schedules(&pool).await,
            ScheduleCmd::Add {
                clients,
                message,
                send_at,
            } => handlers::add_schedule(&pool, &clients, &message, &send_at).await,
            ScheduleCmd::Delete { id } => handlers::delete_schedule(&pool, &id).await,
        },
        Command::Settings(cmd) => match cmd {
            SettingsCmd::Show => handlers::show_settings(&pool, &cfg).await,
            SettingsCmd::Set {
                whatsapp_number,
                gateway_url,
                gateway_token,
            } => {
                let patch = SettingsPatch {
                    whatsapp_number,
                    gateway_url,
                    gateway_token,
                };
                handlers::save_settings(&pool, &patch).await
            }
        },
        Command::Send {
            all,
            clients,
            message,
        } => handlers::send_bulk(&pool, &cfg, all, &clients, &message).await,
        Command::Suggest => handlers::suggest_idea(&cfg).await,
        Command::Interest { dog, name, phone } => {
            handlers::interest_link(&pool, &cfg, &dog, &name, &phone).await
        }
        Command::Inquiry { name, phone } => {
            handlers::inquiry_link(&pool, &cfg, &name, &phone).await
        }
    }
}

/// Schedule sweep worker: one due schedule per iteration, sleeping when
/// there is nothing to do. Settings are re-read on every tick so a
/// gateway configured mid-run is picked up without a restart.
async fn serve(pool: &db::Pool, cfg: &Config) -> Result<()> {
    let gateway = HttpGateway::new(Duration::from_secs(cfg.gateway.timeout_seconds));
    let origin = Origin::from_require_tls(cfg.gateway.require_tls);
    let poll_sleep = Duration::from_millis(cfg.app.poll_interval_ms);

    info!("starting schedule sweep worker");
    loop {
        let tick = async {
            let settings = handlers::effective_settings(pool, cfg).await?;
            let target = GatewayTarget::new(settings.gateway_url, Some(settings.gateway_token));
            scheduler::process_next_schedule(pool, &gateway, &UuidIds, &target, origin, Utc::now())
                .await
        };
        match tick.await {
            Ok(processed) => {
                if !processed {
                    tokio::time::sleep(poll_sleep).await;
                }
            }
            Err(err) => {
                error!(?err, "schedule sweep error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
