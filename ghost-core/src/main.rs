use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use ghost_core::config;
use ghost_core::game::GameFactory;
use ghost_core::realm::RealmSession;
use ghost_core::Orchestrator;
use ghost_db::DbConfig;

/// Headless hosting bot for real-time-strategy lobbies.
#[derive(Parser, Debug)]
#[command(name = "ghost")]
struct Cli {
    /// Path to the config file to load on top of default.cfg.
    #[arg(default_value = "ghost.cfg")]
    config: PathBuf,
}

/// No realm sessions or game factory are wired up here: connecting to a
/// specific chat server's protocol and running an actual Warcraft III game
/// session are both out of scope for this crate. This binary exists to
/// prove the orchestrator boots, loads configuration, and shuts down
/// cleanly; an embedder links `ghost-core` as a library and supplies real
/// `RealmSession`/`GameFactory` implementations.
struct NoGames;

impl GameFactory for NoGames {
    fn spawn(&self, params: ghost_core::game::NewGameParams) -> std::sync::Arc<dyn ghost_core::game::GameHandle> {
        unreachable!("no game factory configured for host counter {}", params.host_counter)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load(&cli.config).map_err(|err| {
        eprintln!("{err}");
        err
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.bot_loglevel.as_tracing_filter())),
        )
        .init();

    tracing::info!("starting up");

    let db = ghost_db::connect(&DbConfig {
        kind: cfg.db_type,
        url: cfg.db_url.clone(),
    })
    .await?;

    let realms: Vec<Box<dyn RealmSession>> = Vec::new();
    let mut orchestrator = Orchestrator::new(&cfg, Box::new(db), realms, Box::new(NoGames));

    install_signal_handler(orchestrator.exit_flag());

    orchestrator.run().await;

    tracing::info!("exited");
    Ok(())
}

/// Two SIGINTs: the first requests a graceful shutdown, the second exits
/// immediately (ghost.cpp's `SignalCatcher`/`SignalCatcher2`). SIGPIPE
/// needs no handling here: the Rust runtime already ignores it by default,
/// unlike C++'s default `SIG_DFL`.
fn install_signal_handler(exiting_nice: std::sync::Arc<std::sync::atomic::AtomicBool>) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }

            if exiting_nice.swap(true, Ordering::SeqCst) {
                tracing::error!("caught signal, exiting now");
                std::process::exit(1);
            }

            tracing::warn!("caught signal, exiting nicely");
        }
    });
}
