use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kubeadmin::cli::{failure_report, format_dry_run, success_report, Args, API_KEY_ENV};
use kubeadmin::client::ReqwestExecutor;
use kubeadmin::config::load_settings;
use kubeadmin::Provisioner;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        dotenvy::from_path(env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
    }

    let settings = load_settings(args.config.as_deref()).context("Failed to load config")?;
    let policy = settings.policy.into_policy();
    let request = args.cluster_request();

    // Dry-run mode: print the request and exit
    if args.dry_run {
        println!("{}", format_dry_run(&request, &settings.endpoints, &policy));
        return Ok(0);
    }

    let api_key = args.api_key().with_context(|| {
        format!(
            "No API key: pass --ibmcloud-api-key or set {}",
            API_KEY_ENV
        )
    })?;

    let executor =
        ReqwestExecutor::new(policy.request_timeout).context("Failed to create HTTP client")?;
    let provisioner = Provisioner::new(Arc::new(executor), Arc::new(settings.endpoints), policy);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling provisioning");
            on_signal.cancel();
        }
    });

    info!("Provisioning cluster {}", request.name);
    match provisioner.provision(&api_key, &request, &cancel).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&success_report(&outcome))?);
            Ok(0)
        }
        Err(failure) => {
            error!("Provisioning failed: {}", failure);
            println!("{}", serde_json::to_string_pretty(&failure_report(&failure))?);
            Ok(1)
        }
    }
}
