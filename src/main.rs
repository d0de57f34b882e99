//! aide: coordination daemon, CLI client, and MCP adapter in one binary.
//!
//! Usage:
//!   aide serve [--root <path>]     # start the daemon
//!   aide mcp [--root <path>]       # MCP server (stdin/stdout) over a running daemon
//!   aide <subcommand> ...          # thin client, talks to the daemon over its socket

use aide::cli::{self, Cli, Commands};
use aide::code::Indexer;
use aide::config::{Config, EnvConfig};
use aide::findings::Runner;
use aide::ignore::IgnoreMatcher;
use aide::mcp::McpServer;
use aide::rpc::{serve, AppState, Client};
use aide::store::{Database, StoreKind, Stores};
use aide::watcher::{Change, Watcher};
use clap::Parser;
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = cli.root.canonicalize().unwrap_or(cli.root.clone());
    let env = EnvConfig::from_env();
    let (json, color) = (cli.json, !cli.no_color);

    init_logging(&root, env.debug)?;

    match cli.command {
        None => {
            eprintln!("Use `aide serve` to start the daemon, `aide mcp` for an MCP adapter,");
            eprintln!("or a subcommand (memory, task, code, ...) for CLI mode.");
            eprintln!("Run with --help for more information.");
            std::process::exit(1);
        }
        Some(Commands::Serve { no_code, no_findings, no_watch }) => {
            run_daemon(root, env, no_code, no_findings, no_watch).await
        }
        Some(Commands::Mcp) => run_mcp(root).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Some(command) => {
            let client = Client::new(aide::socket_path(&root));
            cli::run(&client, command, json, color).await
        }
    }
}

/// Stderr is always attached (stdout is reserved for MCP's JSON-RPC framing
/// in `aide mcp` mode); `AIDE_DEBUG=1` adds a daily-rolling file layer under
/// `.aide/_logs/`.
fn init_logging(root: &std::path::Path, debug: bool) -> anyhow::Result<()> {
    let filter = || EnvFilter::from_default_env().add_directive("aide=info".parse().unwrap());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter());

    if debug {
        std::fs::create_dir_all(aide::logs_dir(root))?;
        let file_appender = tracing_appender::rolling::daily(aide::logs_dir(root), "aide.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leaked intentionally: the guard must outlive the process for buffered
        // writes to flush, and this process never tears the subscriber down.
        Box::leak(Box::new(guard));
        let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false).with_filter(filter());
        tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
    } else {
        tracing_subscriber::registry().with(stderr_layer).init();
    }
    Ok(())
}

/// Brings up the coordination daemon: config, ignore matcher, stores, optional
/// code/findings subsystems, the watcher, and finally the RPC listener (spec §9).
async fn run_daemon(
    root: std::path::PathBuf,
    env: EnvConfig,
    no_code: bool,
    no_findings: bool,
    no_watch: bool,
) -> anyhow::Result<()> {
    if !env.force_init && !is_vcs_root(&root) {
        anyhow::bail!(
            "{} does not look like a version-controlled project root (no .git/.hg/.svn). \
             Re-run with AIDE_FORCE_INIT=1 to initialize anyway.",
            root.display()
        );
    }

    let config = Config::load(&root)?;
    std::fs::create_dir_all(aide::aide_dir(&root))?;

    let ignore = Arc::new(IgnoreMatcher::new(&root)?);

    let memory_db = Arc::new(Database::open(&Stores::memory_db_path(&root), StoreKind::Memory)?);

    let code_disabled = no_code || env.code_store_disable;
    let code_db = if code_disabled {
        None
    } else {
        Some(Arc::new(Database::open(&Stores::code_db_path(&root), StoreKind::Code)?))
    };
    let findings_db = if no_findings {
        None
    } else {
        Some(Arc::new(Database::open(&Stores::findings_db_path(&root), StoreKind::Findings)?))
    };

    let indexer = code_db.clone().map(|db| Arc::new(Indexer::new(db, ignore.clone())));
    let runner = findings_db
        .clone()
        .map(|db| Arc::new(Runner::new(&config.findings, db, ignore.clone())));

    if env.code_store_sync {
        if let Some(indexer) = &indexer {
            tracing::info!("synchronous initial code index starting");
            let stats = indexer.index(&[root.clone()], false, None)?;
            tracing::info!(
                files_indexed = stats.files_indexed,
                symbols_indexed = stats.symbols_indexed,
                "synchronous initial code index complete"
            );
        }
    }

    let stores = Arc::new(Stores { memory: memory_db, code: code_db, findings: findings_db });

    let watcher_slot = Arc::new(AsyncMutex::new(None));
    if !no_watch && env.code_watch {
        if let Some(indexer) = indexer.clone() {
            let indexer_for_sub = indexer;
            let root_for_sub = root.clone();
            let subscriber: aide::watcher::Subscriber = Arc::new(move |changes: Vec<Change>| {
                if changes.is_empty() {
                    return;
                }
                let indexer = indexer_for_sub.clone();
                let root = root_for_sub.clone();
                tokio::task::spawn_blocking(move || {
                    if let Err(err) = indexer.index(&[root], false, None) {
                        tracing::warn!("watcher-triggered reindex failed: {err}");
                    }
                });
            });
            let watcher = Watcher::start(&root, ignore.clone(), env.code_watch_delay, vec![subscriber])?;
            *watcher_slot.lock().await = Some(watcher);
            tracing::info!("filesystem watcher started, debounce = {:?}", env.code_watch_delay);
        }
    }

    let state = AppState { root: root.clone(), stores, ignore, indexer, runner, watcher: watcher_slot };

    let socket_path = aide::socket_path(&root);
    tracing::info!("aide daemon starting for root: {}", root.display());
    serve(&socket_path, state).await?;
    Ok(())
}

async fn run_mcp(root: std::path::PathBuf) -> anyhow::Result<()> {
    let client = aide::rpc::client::connect(&root);
    client.ping().await.map_err(|e| {
        anyhow::anyhow!("aide daemon not reachable at {}: {e}", aide::socket_path(&root).display())
    })?;

    let server = McpServer::new(client);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

fn is_vcs_root(root: &std::path::Path) -> bool {
    [".git", ".hg", ".svn"].iter().any(|marker| root.join(marker).exists())
}
