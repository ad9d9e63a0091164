//! Binary entry point: parses the CLI, loads the instance file, starts the
//! provider manager's retry loop, then runs reconciliation cycles until
//! stopped (or once, with `--run-once`).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use dnsweaver::backend::hosts_file::HostsFileBackend;
use dnsweaver::backend::memory::MemoryBackend;
use dnsweaver::config::{load_instances_file, Cli, OutputFormat};
use dnsweaver::manager::ProviderManager;
use dnsweaver::reconciler::{Reconciler, ReconcilerConfig};
use dnsweaver::registry::InstanceRegistry;
use dnsweaver::source::Source;

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(cli.loglevel.into()).init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn register_backend_factories(registry: &mut InstanceRegistry) {
    registry.register_factory(
        "memory",
        Box::new(|config| Ok(Arc::new(MemoryBackend::new(config.name.clone())) as Arc<_>)),
    );
    registry.register_factory(
        "hosts-file",
        Box::new(|config| {
            let path = config.backend_path.clone().unwrap_or_else(|| "/etc/hosts".into());
            Ok(Arc::new(HostsFileBackend::new(config.name.clone(), path)) as Arc<_>)
        }),
    );
}

async fn run(cli: Cli) -> Result<(), String> {
    let instances_file =
        load_instances_file(&cli.instances_file).map_err(|e| format!("loading {}: {e}", cli.instances_file.display()))?;

    let mut registry = InstanceRegistry::new();
    register_backend_factories(&mut registry);
    let registry = Arc::new(registry);
    let manager = Arc::new(ProviderManager::new(registry.clone()));

    for entry in instances_file.instances {
        let name = entry.name.clone();
        manager
            .initialize_provider(entry.into())
            .await
            .map_err(|e| format!("instance `{name}`: {e}"))?;
    }

    manager.start();

    let reconciler_config = ReconcilerConfig::from(&cli);
    let reconciler = Reconciler::new(registry, reconciler_config);
    // Container-orchestrator label scans and other concrete `Source`s are
    // external collaborators; only the trait ships with this crate. A real
    // deployment wires its own sources in here.
    let sources: Vec<Box<dyn Source>> = Vec::new();

    if cli.run_once {
        let result = reconciler.run_once(&sources).await;
        report_cycle_result(&result, cli.format);
        manager.stop().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(reconciler_config.reconcile_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = reconciler.run_once(&sources).await;
                report_cycle_result(&result, cli.format);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, shutting down");
                break;
            }
        }
    }

    manager.stop().await;
    Ok(())
}

fn report_cycle_result(result: &dnsweaver::reconciler::CycleResult, format: OutputFormat) {
    match format {
        OutputFormat::Text => log_cycle_summary(result),
        OutputFormat::Json => match serde_json::to_string(result) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("failed to serialize cycle result: {e}"),
        },
    }
}

fn log_cycle_summary(result: &dnsweaver::reconciler::CycleResult) {
    info!(
        "cycle complete: {} hostnames discovered, {} created, {} updated, {} deleted, {} failed (dry_run={})",
        result.hostnames_discovered,
        result.created_count(),
        result.updated_count(),
        result.deleted_count(),
        result.failed_count(),
        result.dry_run,
    );
}
