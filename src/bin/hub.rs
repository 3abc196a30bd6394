use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use keepalive_monitor::{
    actors::{
        bot::BotHandle,
        scheduler::{Scheduler, SchedulerHandle, TICK_INTERVAL},
    },
    alerts::AlertDispatcher,
    api::{ApiConfig, spawn_api_server},
    commands::{AuthorizationCache, CommandHandler},
    config::{
        Config, EnvOverrides, NotifierConfig, ResolvedConfig, StorageConfig, read_config_file,
    },
    monitors::{ProbePipeline, Prober, StatusUpdater},
    notify::{LogNotifier, Notifier, TelegramClient, WebhookNotifier},
    storage::{StorageBackend, Stores, memory::MemoryBackend, sqlite::SqliteBackend},
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Log level for the monitor
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Run a single due-check pass, wait for the probes and exit
    #[arg(long)]
    once: bool,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("keepalive_monitor", level),
        ("keepalive_hub", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };
    let config = config.resolve(EnvOverrides::from_env())?;

    let (stores, backend) = open_storage(&config.storage).await?;
    match backend.health_check().await {
        Ok(health) => debug!("storage health: {}", health.message),
        Err(e) => warn!("storage health check failed: {e}"),
    }

    seed_targets(&stores, &config).await?;

    let auth = AuthorizationCache::load(stores.admins.clone(), &config.admins)
        .await
        .context("failed to load admins")?;
    info!("{} admin(s) authorized", auth.len().await);

    let telegram = config
        .telegram
        .as_ref()
        .map(|telegram| TelegramClient::with_api_url(&telegram.token, &telegram.api_url))
        .transpose()?;

    let notifier: Arc<dyn Notifier> = match (&config.notifier, &telegram) {
        (NotifierConfig::Telegram, Some(client)) => Arc::new(client.clone()),
        (NotifierConfig::Telegram, None) => {
            anyhow::bail!("BOT_TOKEN environment variable is required")
        }
        (NotifierConfig::Webhook(webhook), _) => Arc::new(WebhookNotifier::new(&webhook.url)),
        (NotifierConfig::Log, _) => Arc::new(LogNotifier),
    };

    let pipeline = Arc::new(ProbePipeline::new(
        Prober::new()?,
        StatusUpdater::new(stores.targets.clone(), stores.history.clone()),
        AlertDispatcher::new(stores.admins.clone(), notifier, config.alert_mode),
    ));
    let scheduler = Scheduler::new(stores.targets.clone(), pipeline);

    if args.once {
        let reports = scheduler.run_due_pass_and_wait(chrono::Utc::now()).await?;
        let online = reports.iter().filter(|r| r.outcome.success).count();
        info!("probed {} target(s), {} online", reports.len(), online);
        backend.close().await?;
        return Ok(());
    }

    let scheduler = SchedulerHandle::spawn(scheduler, TICK_INTERVAL);

    let bot = match telegram {
        Some(client) => Some(BotHandle::spawn(
            client,
            CommandHandler::new(stores.clone(), auth.clone()),
        )),
        None => {
            info!("no bot token configured, command interface disabled");
            None
        }
    };

    spawn_api_server(ApiConfig::with_port(config.port)).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Err(e) = scheduler.shutdown().await {
        error!("{e:#}");
    }
    if let Some(bot) = bot {
        if let Err(e) = bot.shutdown().await {
            error!("{e:#}");
        }
    }

    backend.close().await?;

    Ok(())
}

async fn open_storage(config: &StorageConfig) -> anyhow::Result<(Stores, Arc<dyn StorageBackend>)> {
    match config {
        StorageConfig::None => {
            warn!("using in-memory storage, nothing will be persisted");
            let backend = Arc::new(MemoryBackend::new());
            let lifecycle: Arc<dyn StorageBackend> = backend.clone();
            Ok((Stores::from_backend(backend), lifecycle))
        }
        StorageConfig::Sqlite { path } => {
            info!("opening SQLite database at {}", path.display());
            let backend = SqliteBackend::new(path)
                .await
                .context("failed to open database")?;
            Ok(sqlite_stores(backend))
        }
        StorageConfig::Url { url } => {
            info!("connecting to database");
            let backend = SqliteBackend::connect(url)
                .await
                .context("failed to connect to database")?;
            Ok(sqlite_stores(backend))
        }
    }
}

fn sqlite_stores(backend: SqliteBackend) -> (Stores, Arc<dyn StorageBackend>) {
    let backend = Arc::new(backend);
    let lifecycle: Arc<dyn StorageBackend> = backend.clone();
    (Stores::from_backend(backend), lifecycle)
}

async fn seed_targets(stores: &Stores, config: &ResolvedConfig) -> anyhow::Result<()> {
    let mut targets = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        match target.to_new_target() {
            Ok(target) => targets.push(target),
            Err(e) => warn!("skipping configured target {}: {e}", target.name),
        }
    }

    let added = stores.seed_targets(targets).await?;
    if added > 0 {
        info!("registered {added} target(s) from config");
    }
    Ok(())
}
