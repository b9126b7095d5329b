mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use application::group_service::GroupService;
use data::Repositories;
use data::memory::MemoryStore;
use infrastructure::config::AppConfig;
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::logging::init_logging;
use infrastructure::media::LocalImageStore;
use server::AppState;

#[derive(Parser)]
#[command(name = "yatube", about = "Yatube blog server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a post group
    CreateGroup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

async fn open_repositories(config: &AppConfig) -> anyhow::Result<Repositories> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Ok(Repositories::postgres(pool))
        }
        None => {
            warn!("DATABASE_URL is not set, data is kept in memory and lost on exit");
            Ok(Repositories::memory(Arc::new(MemoryStore::new())))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let repos = open_repositories(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let images = LocalImageStore::new(config.media_root.clone()).await?;
            let state = AppState::new(&config, &repos, Arc::new(images));
            server::run(config, state).await
        }
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            let group = GroupService::new(Arc::clone(&repos.groups))
                .create(title, slug, description)
                .await?;
            info!(group_id = %group.id, slug = %group.slug, "group created");
            println!("created group {} ({})", group, group.slug);
            Ok(())
        }
    }
}
