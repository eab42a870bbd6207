use clap::{Parser, Subcommand};
use std::sync::Arc;

use event_checkin::config::Settings;
use event_checkin::error::Result;
use event_checkin::server::AppState;
use event_checkin::storage::{InMemoryStorage, Storage};
use event_checkin::{logging, metrics, seed, server, validators};

#[derive(Parser)]
#[command(name = "event_checkin")]
#[command(about = "Event registration and participant check-in backend")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on (defaults to the configured server_port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Populate the canonical occupation and specific-need catalogs
    Seed,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Run database migrations
    #[cfg(feature = "db")]
    Migrate,
}

/// Pick the storage backend: libSQL when compiled with `db` and configured,
/// the in-memory store otherwise
#[cfg_attr(not(feature = "db"), allow(unused_variables))]
async fn build_storage(settings: &Settings) -> Result<Arc<dyn Storage>> {
    #[cfg(feature = "db")]
    {
        if settings.database_path.is_some() || std::env::var("LIBSQL_URL").is_ok() {
            let manager = event_checkin::db::DatabaseManager::connect(settings).await?;
            manager.run_migrations().await?;
            return Ok(Arc::new(event_checkin::db::LibsqlStorage::new(manager)));
        }
    }

    println!("💾 Using in-memory storage (data is not persisted)");
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    // An empty catalog makes registration impossible; seed the defaults
    seed::seed_catalogs(storage.clone()).await?;
    Ok(storage)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let settings = Arc::new(Settings::load()?);

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();

            let storage = build_storage(&settings).await?;
            let port = port.unwrap_or(settings.server_port);

            server::start_server(
                AppState {
                    storage,
                    settings: settings.clone(),
                },
                port,
            )
            .await?;
        }
        Commands::Seed => {
            let storage = build_storage(&settings).await?;
            let report = seed::seed_catalogs(storage).await?;
            println!(
                "✅ Seeded catalogs: {} occupations, {} specific needs inserted",
                report.occupations_created, report.needs_created
            );
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            let name = validators::validate_name("Name", &name)?;
            let email = validators::validate_email(&email)?;
            validators::validate_password(&password)?;

            let storage = build_storage(&settings).await?;
            match seed::create_administrator(storage, name, email, &password).await? {
                Some(administrator) => {
                    println!("✅ Created administrator {} ({})", administrator.name, administrator.id);
                }
                None => {
                    println!("⚠️  An administrator with that email already exists");
                }
            }
        }
        #[cfg(feature = "db")]
        Commands::Migrate => {
            let manager = event_checkin::db::DatabaseManager::connect(&settings).await?;
            manager.run_migrations().await?;
            println!("✅ Migrations completed");
        }
    }
    Ok(())
}
