use std::{
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use anyhow::Result;
use clap::Parser;
use futures::{stream, StreamExt};
use tracing_subscriber::EnvFilter;
use wedash_config::discover;
use wedash_core::{
    Dashboard, DashboardOptions, MakefileTargets, StatusProber, SystemdStatus, UnixProcessManager,
    MAX_IN_FLIGHT,
};
use wedash_types::Service;

mod app;
mod config;
mod logger;
mod tui;
mod ui;

use crate::{app::App, config::Columns, logger::Logger};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    init_tracing(&cli)?;

    let roots = cli.roots();
    let services = discover(&roots, cli.max_depth);
    tracing::info!("Discovered {} services under {roots:?}", services.len());

    if cli.list {
        list(services, cli.columns).await;
        return Ok(());
    }

    let options = DashboardOptions {
        roots,
        max_depth: cli.max_depth,
        last: cli.last,
        ..DashboardOptions::default()
    };
    let (dashboard, events) = Dashboard::new(
        UnixProcessManager::new(),
        SystemdStatus::new(),
        Arc::new(MakefileTargets),
        services,
        options,
    );
    let app = App::new(dashboard.registry(), dashboard.log(), cli.columns);

    tui::run(dashboard, events, app).await
}

/// Diagnostics go to stderr for `--list`. The TUI owns the terminal, so they
/// go to `--log-file` or nowhere.
fn init_tracing(cli: &config::Cli) -> Result<()> {
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("WEDASH_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if cli.list {
        subscriber.with_writer(io::stderr).init();
    } else if let Some(path) = &cli.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        subscriber.with_writer(io::sink).init();
    }

    Ok(())
}

async fn list(services: Vec<Service>, columns: Columns) {
    let mut logger = Logger::default();
    if services.is_empty() {
        logger.system("No services found");
        return;
    }

    let prober = StatusProber::new(SystemdStatus::new());
    let probes: Vec<_> = stream::iter(&services)
        .map(|service| prober.probe(service))
        .buffered(MAX_IN_FLIGHT)
        .collect()
        .await;

    let now = SystemTime::now();
    for (mut service, probe) in services.into_iter().zip(probes) {
        service.state = probe.state;
        service.pid = probe.pid;
        service.updated_at = Some(now);
        logger.service(&service, columns);
    }
}
