// src/lib.rs

pub mod bot;
pub mod cli;
pub mod config;
pub mod device;
pub mod emulator;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sched;
pub mod tasks;
pub mod types;
pub mod vision;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::emulator::LdConsole;
use crate::engine::{CoreSessions, Runtime, RuntimeOptions, SessionEvent};
use crate::exec::{AdbConnector, RealWorkerBackend, WorkerEnv};
use crate::sched::StatusEvent;
use crate::tasks::TaskRegistry;
use crate::types::TaskStatus;
use crate::vision::TemplateMatcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the task registry
/// - the session core / runtime and the worker backend
/// - status reporting
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    if args.list_tasks {
        print_task_list(&TaskRegistry::builtin(Vec::new()));
        return Ok(());
    }

    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let registry = TaskRegistry::builtin(cfg.friend_ids());

    if let Some(task) = &args.task {
        registry.select(Some(task))?;
    }
    let emulators = selected_emulators(&args, &cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &registry, &emulators, &args);
        return Ok(());
    }

    let (rt_tx, rt_rx) = mpsc::channel::<SessionEvent>(64);
    let (status_tx, status_rx) = mpsc::unbounded_channel::<StatusEvent>();
    let status_printer = tokio::spawn(collect_statuses(status_rx));

    let cfg = Arc::new(cfg);
    let env = WorkerEnv::new(
        Arc::clone(&cfg),
        Arc::new(registry),
        Arc::new(LdConsole::from_config(&cfg.emulator)),
        Arc::new(AdbConnector::new(cfg.device.adb_path.clone())),
        Arc::new(TemplateMatcher::new(cfg.device.assets_dir.clone())),
    )
    .with_status_channel(status_tx);
    let backend = RealWorkerBackend::new(Arc::new(env), rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(SessionEvent::ShutdownRequested).await;
        });
    }

    info!(?emulators, task = ?args.task, refresh = args.refresh, "starting sessions");
    for &emulator in &emulators {
        let event = if args.refresh {
            SessionEvent::Refresh { emulator }
        } else {
            SessionEvent::Start {
                emulator,
                target: args.task.clone(),
            }
        };
        rt_tx.send(event).await?;
    }

    let core = CoreSessions::new(RuntimeOptions {
        exit_when_idle: true,
    });
    let runtime = Runtime::new(core, rt_rx, backend);
    runtime.run().await?;

    // The backend holds the last status sender; once the runtime is gone the
    // printer drains and returns.
    let statuses = status_printer.await?;
    print_summary(&statuses);
    Ok(())
}

/// `--emulator` values, or every configured account.
fn selected_emulators(args: &CliArgs, cfg: &ConfigFile) -> Result<Vec<u32>> {
    if args.emulators.is_empty() {
        return Ok(cfg.accounts.iter().map(|a| a.emulator_index).collect());
    }
    for idx in &args.emulators {
        if cfg.account(*idx).is_none() {
            bail!("emulator {idx} has no [[account]] entry in the config");
        }
    }
    Ok(args.emulators.clone())
}

/// Log every status change and keep the latest per (emulator, task).
async fn collect_statuses(
    mut rx: mpsc::UnboundedReceiver<StatusEvent>,
) -> BTreeMap<u32, Vec<(String, TaskStatus)>> {
    let mut table: BTreeMap<u32, Vec<(String, TaskStatus)>> = BTreeMap::new();
    while let Some(ev) = rx.recv().await {
        info!(emulator = ev.emulator, task = %ev.task, status = %ev.status, "status");
        let rows = table.entry(ev.emulator).or_default();
        match rows.iter_mut().find(|(name, _)| *name == ev.task) {
            Some(row) => row.1 = ev.status,
            None => rows.push((ev.task, ev.status)),
        }
    }
    table
}

fn print_summary(table: &BTreeMap<u32, Vec<(String, TaskStatus)>>) {
    for (emulator, rows) in table {
        println!("emulator {emulator}:");
        for (task, status) in rows {
            println!("  {status:<8} {task}");
        }
    }
}

fn print_task_list(registry: &TaskRegistry) {
    for def in registry.tasks() {
        match &def.label {
            Some(label) => println!("{}  ({label})", def.name),
            None => println!("{}", def.name),
        }
    }
}

fn print_dry_run(cfg: &ConfigFile, registry: &TaskRegistry, emulators: &[u32], args: &CliArgs) {
    println!("dailybot dry-run");
    println!("  device.package = {}", cfg.device.package);
    println!("  device.reset_depth = {:?}", cfg.device.reset_depth);
    println!("  emulator.console_path = {}", cfg.emulator.console_path.display());
    println!("  emulator.launch = {}", cfg.emulator.launch);
    println!();

    println!("emulators ({}):", emulators.len());
    for idx in emulators {
        let name = cfg
            .account(*idx)
            .map(|a| a.display_name())
            .unwrap_or_default();
        println!("  - {idx} {name}");
    }
    println!();

    if args.refresh {
        println!("mode: refresh progress only");
    } else if let Some(task) = &args.task {
        println!("mode: single task '{task}'");
    } else {
        println!("mode: full run ({} tasks)", registry.len());
    }
    for def in registry.tasks() {
        println!("  - {}", def.name);
    }
    let friends = cfg.friend_ids();
    if !friends.is_empty() {
        println!("friend ids: {}", friends.join(", "));
    }

    debug!("dry-run complete (no device touched)");
}
