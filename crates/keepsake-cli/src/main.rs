mod helper;
mod input;
mod logging;
mod render;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use keepsake_application::{AuthChannel, ChatSession, SessionConfig};
use keepsake_core::chat::{BlobStore, FileRepository, KeyValueStore, ProgressRepository};
use keepsake_infrastructure::storage::{
    DirBlobStore, FileKeyValueStore, MemoryBlobStore, MemoryKeyValueStore,
};
use keepsake_infrastructure::{
    AppConfig, ConfigService, DurableFileStore, KeepsakePaths, ProgressStore,
};
use keepsake_interaction::MemorialApiClient;

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(about = "Tell the story behind a memorial page, one question at a time", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where progress and the pending attachment are stored
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or continue the onboarding conversation (default)
    Chat(ChatArgs),
    /// Show the stored progress
    Status,
    /// Discard stored progress and the pending attachment
    Reset,
}

#[derive(Args, Default)]
struct ChatArgs {
    /// Bearer token to start signed in
    #[arg(long, env = "KEEPSAKE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keep everything in memory; nothing survives the process
    #[arg(long)]
    ephemeral: bool,

    /// Show assistant messages without the typing pause
    #[arg(long)]
    no_delay: bool,
}

/// Repositories backing one run.
struct Stores {
    progress: Arc<dyn ProgressRepository>,
    files: Arc<dyn FileRepository>,
}

impl Stores {
    fn on_disk(config: &AppConfig, data_dir: &Path) -> Self {
        let kv = FileKeyValueStore::new(KeepsakePaths::local_storage_dir(data_dir))
            .with_quota(config.storage_quota_bytes);
        Self::from_raw(Arc::new(kv), Arc::new(DirBlobStore::new(data_dir)))
    }

    fn in_memory(config: &AppConfig) -> Self {
        Self::from_raw(
            Arc::new(MemoryKeyValueStore::with_quota(config.storage_quota_bytes)),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    fn from_raw(kv: Arc<dyn KeyValueStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            progress: Arc::new(ProgressStore::new(kv)),
            files: Arc::new(DurableFileStore::new(blobs)),
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let service = match &cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let mut config = service.load()?;

    if let Some(url) = &cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let data_dir = config.resolved_data_dir()?;
    let _log_guard = logging::init(Some(&KeepsakePaths::logs_dir(&data_dir)));
    tracing::debug!("[Main] Data directory: {}", data_dir.display());

    match cli.command {
        Some(Commands::Chat(args)) => chat(&config, &data_dir, args).await,
        None => chat(&config, &data_dir, ChatArgs::default()).await,
        Some(Commands::Status) => status(&config, &data_dir).await,
        Some(Commands::Reset) => reset(&config, &data_dir).await,
    }
}

async fn chat(config: &AppConfig, data_dir: &Path, args: ChatArgs) -> Result<()> {
    let api = MemorialApiClient::new(&config.api_base_url, config.request_timeout())?;
    let stores = if args.ephemeral {
        Stores::in_memory(config)
    } else {
        Stores::on_disk(config, data_dir)
    };

    let auth = AuthChannel::default();
    if let Some(token) = args.token.filter(|token| !token.trim().is_empty()) {
        auth.login(token);
    }

    let session_config = SessionConfig {
        typing_delay: if args.no_delay {
            Duration::ZERO
        } else {
            config.typing_delay()
        },
    };

    tracing::info!("[Main] Backend: {}", api.base_url());
    let session = Arc::new(ChatSession::new(
        Arc::new(api),
        stores.progress,
        stores.files,
        auth.subscribe(),
        session_config,
    ));

    repl::run(session, auth).await
}

async fn status(config: &AppConfig, data_dir: &Path) -> Result<()> {
    let stores = Stores::on_disk(config, data_dir);

    let Some(progress) = stores.progress.load() else {
        println!("{}", "No saved conversation.".bright_black());
        return Ok(());
    };

    let state = if progress.is_complete {
        "complete".bright_green()
    } else if progress.submit_pending {
        "waiting for sign-in".yellow()
    } else {
        "in progress".normal()
    };
    let answered = progress.messages.iter().filter(|m| m.is_from_user).count();

    println!("State:    {}", state);
    println!("Step:     {}", progress.current_step_index + 1);
    println!("Answers:  {}", answered);
    if !progress.collected_name.is_empty() {
        println!("Name:     {}", progress.collected_name);
    }
    match stores.files.get().await {
        Some(file) => println!("File:     {} ({} bytes)", file.name(), file.meta.byte_size),
        None => println!("File:     none"),
    }
    println!(
        "Saved at: {}",
        progress.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

async fn reset(config: &AppConfig, data_dir: &Path) -> Result<()> {
    let stores = Stores::on_disk(config, data_dir);
    stores.progress.clear();
    stores.files.delete().await;
    println!("{}", "Saved conversation and attachment removed.".bright_green());
    Ok(())
}
