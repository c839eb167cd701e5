use anyhow::{Context, Result, bail};
use clap::Parser;
use rgw_provider::{
    clients::{RemoteClients, admin::RgwAdminClient, s3::S3ObjectClient},
    config::{
        BucketCommand, BucketsCommand, Cli, Command, ImportTarget, ProviderConfig, UserCommand,
        state_url,
    },
    models::manifest::Manifest,
    services::{
        apply::{Orchestrator, Report},
        bucket_service::BucketService,
        datasource::{BucketFilter, DataSources, mask_secret},
        state_store::StateStore,
        user_service::UserService,
    },
};
use serde::Serialize;
use std::{fs, path::Path, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr, stdout carries JSON results) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let env = |var: &str| std::env::var(var).ok();

    // --- Tracked state ---
    let store = if cli.command.needs_state() {
        Some(open_state(&state_url(&cli.provider, env)).await?)
    } else {
        None
    };

    if !cli.command.needs_gateway() {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Gateway clients ---
    let provider = ProviderConfig::from_env_and_args(&cli.provider)?;
    tracing::debug!("Resolved provider config: {:?}", provider);
    let clients = build_clients(&provider)?;

    match (cli.command, store) {
        (Command::Bucket { command: BucketCommand::Show { name } }, _) => {
            print_json(&DataSources::new(clients).show_bucket(&name).await?)
        }
        (Command::Buckets { command: BucketsCommand::List { name, owner } }, _) => {
            let filter = BucketFilter { name, owner };
            print_json(&DataSources::new(clients).list_buckets(&filter).await?)
        }
        (Command::User { command: UserCommand::Show { id, reveal } }, _) => {
            let user = DataSources::new(clients).show_user(&id).await?;
            print_json(&if reveal { user } else { mask_secret(user) })
        }
        (command, Some(store)) => run_tracked(command, clients, store).await,
        (command, None) => bail!("{command:?} requires tracked state"),
    }
}

/// Subcommands that read or write tracked state.
async fn run_tracked(command: Command, clients: RemoteClients, store: StateStore) -> Result<()> {
    let parallelism = match &command {
        Command::Apply { parallelism, .. } => *parallelism,
        _ => 4,
    };
    let orchestrator = Orchestrator::new(
        BucketService::new(clients.clone()),
        UserService::new(clients),
        store,
        parallelism,
    );

    match command {
        Command::Apply { manifest, .. } => {
            let manifest = load_manifest(&manifest)?;
            finish(orchestrator.apply(&manifest).await?)
        }
        Command::Refresh => finish(orchestrator.refresh().await?),
        Command::Destroy => finish(orchestrator.destroy().await?),
        Command::Import {
            target: ImportTarget::Bucket { name },
        } => print_json(&orchestrator.import_bucket(&name).await?),
        Command::Import {
            target: ImportTarget::User { id },
        } => print_json(&mask_secret(orchestrator.import_user(&id).await?)),
        Command::User {
            command: UserCommand::RotateKeys { id },
        } => print_json(&orchestrator.rotate_keys(&id).await?),
        other => bail!("{other:?} does not use tracked state"),
    }
}

fn build_clients(provider: &ProviderConfig) -> Result<RemoteClients> {
    let admin = RgwAdminClient::new(
        provider.endpoint.as_str(),
        provider.access_key.as_str(),
        provider.secret_key.as_str(),
    )
    .context("building admin API client")?;
    let s3 = S3ObjectClient::new(
        &provider.endpoint,
        &provider.access_key,
        &provider.secret_key,
        &provider.zone,
    );
    Ok(RemoteClients::new(Arc::new(admin), Arc::new(s3)))
}

/// Open the SQLite state database, creating its directory when missing.
async fn open_state(url: &str) -> Result<StateStore> {
    let db_path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    StateStore::connect(url)
        .await
        .with_context(|| format!("opening tracked state at {url}"))
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
    Manifest::from_json(&raw).with_context(|| format!("loading manifest {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(report: Report) -> Result<()> {
    print_json(&report)?;
    if !report.is_success() {
        bail!(
            "{} of {} entities failed",
            report.failures.len(),
            report.failures.len() + report.outcomes.len()
        );
    }
    Ok(())
}
