use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper::access::AccessGate;
use gatekeeper::config::{self, Backend, Config};
use gatekeeper::local::{FileKvStore, KeyValueStore, LocalCodeStore};
use gatekeeper::notification::slack::SlackNotifier;
use gatekeeper::store::postgres::PgRequestStore;
use gatekeeper::store::rest::RestRequestStore;
use gatekeeper::store::RequestStore;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gatekeeper=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load()?;

    let kv: Arc<dyn KeyValueStore> = Arc::new(
        FileKvStore::open(&cfg.state_dir).context("failed to open local state")?,
    );

    let result = match args.command {
        Some(cli::Commands::Codes) => {
            list_codes(&LocalCodeStore::new(kv));
            Ok(())
        }
        Some(cli::Commands::Use { code }) => run_gate(&cfg, kv, &code).await,
        Some(cli::Commands::Request) | None => run_gate(&cfg, kv, "").await,
    };

    if let Err(ref e) = result {
        tracing::error!("{:#}", e);
    }
    result
}

fn list_codes(local: &LocalCodeStore) {
    let codes = local.load();
    if codes.is_empty() {
        println!("No saved codes.");
    } else {
        println!("Saved codes:");
        for code in codes {
            println!("  {}", code);
        }
    }
    if local.load_approval_flag() {
        println!("Access already approved on this machine.");
    }
}

async fn connect_store(backend: &Backend) -> anyhow::Result<Arc<dyn RequestStore>> {
    match backend {
        Backend::Postgres { database_url } => {
            let store = PgRequestStore::connect(database_url)
                .await
                .context("failed to connect to database")?;
            store.migrate().await.context("failed to run migrations")?;
            Ok(Arc::new(store))
        }
        Backend::Rest { base_url, api_key } => {
            Ok(Arc::new(RestRequestStore::new(base_url, api_key.clone())?))
        }
    }
}

async fn run_gate(cfg: &Config, kv: Arc<dyn KeyValueStore>, input: &str) -> anyhow::Result<()> {
    let (granted_tx, granted_rx) = tokio::sync::oneshot::channel::<()>();

    // Already approved: no connection needed.
    if LocalCodeStore::new(kv.clone()).load_approval_flag() {
        println!("Access granted.");
        return Ok(());
    }

    let store = connect_store(cfg.require_backend()?).await?;
    let gate = AccessGate::builder(store, kv)
        .notifier(SlackNotifier::new(cfg.slack_webhook_url.clone()))
        .open(move || {
            let _ = granted_tx.send(());
        });

    let code = gate.submit(input).await?;
    println!("Your code: {}", code);
    println!("Status: waiting for approval...");

    tokio::select! {
        _ = granted_rx => {
            println!("Access granted.");
        }
        _ = tokio::signal::ctrl_c() => {
            gate.close();
            println!("Stopped waiting. Run `gatekeeper use {}` to resume.", code);
        }
    }

    Ok(())
}
