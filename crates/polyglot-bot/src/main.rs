use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use polyglot_agent::openai::OpenAiProvider;
use polyglot_agent::{language, LlmProvider, Relay, TaskAction, TaskDispatcher, TaskRequest};
use polyglot_core::PolyglotConfig;
use polyglot_discord::DiscordAdapter;
use polyglot_store::{MessageStore, RetentionSweeper};

/// Polyglot: a Discord relay that translates messages in context.
#[derive(Parser, Debug)]
#[command(name = "polyglot-bot", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (default: ~/.polyglot/polyglot.toml).
    #[arg(long, global = true, env = "POLYGLOT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Connect to Discord and relay until interrupted (default).
    Run,
    /// Delete messages past the retention horizon once and exit.
    Sweep,
    /// Send one translation request with no context and print the reply.
    Translate {
        text: String,
        /// Target language; the configured default when omitted.
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "polyglot_bot=info,polyglot_agent=info,polyglot_store=info,polyglot_discord=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = match PolyglotConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(code = e.code(), error = %e, "config load failed");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Sweep => sweep(&config),
        Command::Translate { text, target } => translate(&config, &text, target).await,
    }
}

async fn run(config: PolyglotConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let provider = build_provider(&config)?;
    let relay = Arc::new(Relay::new(Arc::clone(&store), provider, &config));
    info!(
        triggers = relay.triggers().len(),
        context_window = config.relay.context_window,
        "relay ready"
    );

    let sweeper = RetentionSweeper::new(
        Arc::clone(&store),
        config.relay.retention(),
        config.relay.sweep_interval(),
    )
    .spawn();

    match config.discord {
        Some(ref discord_cfg) => {
            let adapter = DiscordAdapter::new(discord_cfg, Arc::clone(&relay))?;
            let tasks = adapter.tasks();
            info!("Discord adapter starting");
            tokio::select! {
                _ = adapter.run() => {}
                _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
            }

            // In-flight dispatches finish or hit their own timeouts.
            tasks.close();
            let grace = config.provider.timeout() * 2 + Duration::from_secs(5);
            if tokio::time::timeout(grace, tasks.wait()).await.is_err() {
                warn!(pending = tasks.len(), "dispatches still running at shutdown");
            }
        }
        None => {
            warn!("no [discord] section configured, only the retention sweeper is running");
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");
        }
    }

    sweeper.shutdown().await;
    Ok(())
}

fn sweep(config: &PolyglotConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let sweeper = RetentionSweeper::new(
        Arc::clone(&store),
        config.relay.retention(),
        config.relay.sweep_interval(),
    );
    let removed = sweeper.sweep_at(chrono::Utc::now())?;
    println!("removed {removed} expired messages, {} remain", store.count()?);
    Ok(())
}

async fn translate(config: &PolyglotConfig, text: &str, target: Option<String>) -> anyhow::Result<()> {
    let provider = build_provider(config)?;
    let dispatcher = TaskDispatcher::new(provider, &config.provider, &config.relay.default_target);
    let action = TaskAction::Translate {
        target: target.map(|t| language::canonical_name(&t)),
    };
    let request = TaskRequest::new(text, Vec::new(), action);

    match dispatcher.dispatch(&request).await {
        Ok(result) => {
            println!("[{}]\n{}", kind_label(&request.action), result.primary);
            for a in result.annotations.iter().filter(|a| !a.text.is_empty()) {
                println!("\n[{}]\n{}", a.name, a.text);
            }
            Ok(())
        }
        Err(e) => {
            if let Some(raw) = e.raw_reply() {
                println!("{raw}");
            }
            Err(e.into())
        }
    }
}

fn kind_label(action: &TaskAction) -> String {
    match action {
        TaskAction::Translate { target: Some(t) } => format!("Translation → {t}"),
        TaskAction::Translate { target: None } => "Translation".to_string(),
        TaskAction::Task { instruction } => format!("Result: {instruction}"),
    }
}

fn open_store(config: &PolyglotConfig) -> anyhow::Result<Arc<MessageStore>> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let store = MessageStore::open(db_path).with_context(|| format!("opening {db_path}"))?;
    Ok(Arc::new(store))
}

/// OpenAI-compatible client from `[provider]`, falling back to `OPENAI_API_KEY`.
fn build_provider(config: &PolyglotConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = config
        .provider
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    if api_key.is_none() {
        warn!("no provider api_key configured, requests will be sent unauthenticated");
    }
    info!(
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        "LLM provider configured"
    );
    let provider = OpenAiProvider::new(
        api_key,
        config.provider.base_url.clone(),
        config.provider.timeout(),
    )?;
    Ok(Arc::new(provider))
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
