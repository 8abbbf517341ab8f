use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use cronwork_core::{CronEvaluator, InvocationRegistry, ScheduleError, Task};
use cronwork_driver::{DriverConfig, DriverFactory, ScheduleDriver};
use cronwork_scheduler::{ManifestSource, ScheduleManager, TaskSource};
use cronwork_worker::Worker;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

#[derive(Parser)]
#[command(name = "cronwork", version, about = "Cron-driven task scheduling")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Schedule driver: cache, redis or null.
    #[arg(long, global = true, default_value = "cache")]
    driver: String,

    /// Connection string for the redis driver.
    #[arg(long, global = true, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Backing file for the cache driver; omitted means in-memory only.
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// JSON task manifest. When set, commands scan it fresh instead of
    /// booting from the compiled schedule.
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// IANA timezone cron expressions are evaluated in.
    #[arg(long, global = true, default_value = "UTC")]
    timezone: String,
}

#[derive(Subcommand)]
enum Command {
    /// Print every scheduled task with its next run time and last state.
    List,
    /// Compile the manifest and store it for production boots.
    Optimize,
    /// Run everything currently due once, then exit.
    Run {
        /// Also print skipped tasks.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Poll the schedule until interrupted.
    Work {
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 500)]
        tick_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let tz: chrono_tz::Tz = cli
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown timezone: {}", cli.timezone))?;
    let evaluator = CronEvaluator::new(tz);

    let config = DriverConfig {
        redis_url: Some(cli.redis_url.clone()),
        cache_file: cli.cache_file.clone(),
    };
    let driver = DriverFactory::make(&cli.driver, &config)
        .await
        .context("building schedule driver")?;

    match &cli.command {
        Command::List => list(&cli, driver, &evaluator).await,
        Command::Optimize => optimize(&cli, driver).await,
        Command::Run { verbose } => run_once(&cli, driver, &evaluator, *verbose).await,
        Command::Work { tick_ms } => work(&cli, driver, evaluator, *tick_ms).await,
    }
}

async fn boot(cli: &Cli, driver: Arc<dyn ScheduleDriver>) -> anyhow::Result<ScheduleManager> {
    let source = cli.manifest.as_ref().map(ManifestSource::new);
    let manager = ScheduleManager::boot(
        driver,
        source.as_ref().map(|s| s as &dyn TaskSource),
        source.is_some(),
    )
    .await
    .context("booting schedule")?;
    Ok(manager)
}

async fn list(
    cli: &Cli,
    driver: Arc<dyn ScheduleDriver>,
    evaluator: &CronEvaluator,
) -> anyhow::Result<()> {
    let manager = boot(cli, driver).await?;

    if manager.all().is_empty() {
        println!("{DIM}no scheduled tasks{RESET}");
        return Ok(());
    }

    for task in manager.all() {
        let next = match evaluator.next_run(&task.expression) {
            Ok(at) => at.with_timezone(&evaluator.timezone()).to_rfc3339(),
            Err(e) => format!("{RED}invalid: {e}{RESET}"),
        };
        let tags = if task.tags.is_empty() {
            String::new()
        } else {
            format!(" {DIM}[{}]{RESET}", task.tags.join(", "))
        };

        println!(
            "{CYAN}{}{RESET}  {:<14}  next {next}{tags}",
            task.id, task.expression
        );

        if let Some(state) = manager.driver().get_task_state(&task.id).await? {
            let status = state
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let last_run = state
                .get("last_run")
                .and_then(|v| v.as_str())
                .unwrap_or("never");
            println!("  {DIM}last {last_run} ({status}){RESET}");
        }
    }

    Ok(())
}

async fn optimize(cli: &Cli, driver: Arc<dyn ScheduleDriver>) -> anyhow::Result<()> {
    let Some(path) = &cli.manifest else {
        bail!("optimize needs --manifest pointing at the task manifest");
    };

    let source = ManifestSource::new(path);
    let manager = ScheduleManager::boot(driver, Some(&source), true).await?;
    manager.optimize().await.context("storing compiled schedule")?;

    println!(
        "{GREEN}compiled{RESET} {} task(s) from {}",
        manager.all().len(),
        path.display()
    );
    Ok(())
}

fn stamp() -> String {
    format!("{DIM}{}{RESET}", Utc::now().format("%H:%M:%S"))
}

/// Single pass over the schedule, the cron-entry mode: every due task runs
/// exactly once and the process exits. Last-run bookkeeping is left alone so
/// the external cron cadence fully owns deduplication. Individual task
/// failures print FAILED lines without touching the exit code; only a
/// failure of the pass itself (boot, driver) exits non-zero.
async fn run_once(
    cli: &Cli,
    driver: Arc<dyn ScheduleDriver>,
    evaluator: &CronEvaluator,
    verbose: bool,
) -> anyhow::Result<()> {
    let manager = boot(cli, driver).await?;
    let registry = InvocationRegistry::new();
    let now = Utc::now();

    for task in manager.all() {
        // A malformed expression fails this task's line only, never the pass.
        let due = match task.is_due(evaluator, now) {
            Ok(due) => due,
            Err(error) => {
                println!("{} {RED}FAILED{RESET} {} ({error})", stamp(), task.id);
                continue;
            }
        };
        if !due {
            if verbose {
                println!("{} {DIM}SKIP{RESET}   {}", stamp(), task.id);
            }
            continue;
        }

        if (task.without_overlapping || task.on_one_server)
            && !manager
                .driver()
                .try_acquire(&task.id, Duration::from_secs(task.ttl))
                .await?
        {
            println!("{} {YELLOW}HELD{RESET}   {}", stamp(), task.id);
            continue;
        }

        run_and_report(task, &registry, &manager).await;

        if task.without_overlapping && !task.on_one_server {
            manager.driver().release(&task.id).await?;
        }
    }

    for task in manager.get_pending_tasks().await? {
        println!("{} {CYAN}PEND{RESET}   {}", stamp(), task.id);
        run_and_report(&task, &registry, &manager).await;
    }

    Ok(())
}

/// Run one task and print its outcome line. Per-task errors never abort the
/// pass.
async fn run_and_report(task: &Task, registry: &InvocationRegistry, manager: &ScheduleManager) {
    println!("{} {CYAN}RUN{RESET}    {}", stamp(), task.id);
    task.dispatch_starting(manager.bus());

    match task.execute(registry).await {
        Ok(outcome) if outcome.is_success() => {
            println!("{} {GREEN}DONE{RESET}   {}", stamp(), task.id);
            task.dispatch_finished(manager.bus(), outcome);
        }
        Ok(outcome) => {
            println!(
                "{} {RED}FAILED{RESET} {} (exit {})",
                stamp(),
                task.id,
                outcome.exit_code()
            );
            // Same event semantics as the worker: a non-zero exit is both a
            // failure and a finished run.
            let error = ScheduleError::Execution(format!(
                "command exited with status {}",
                outcome.exit_code()
            ));
            task.dispatch_failed(manager.bus(), &error);
            task.dispatch_finished(manager.bus(), outcome);
        }
        Err(error) => {
            println!("{} {RED}FAILED{RESET} {} ({error})", stamp(), task.id);
            task.dispatch_failed(manager.bus(), &error);
        }
    }
}

async fn work(
    cli: &Cli,
    driver: Arc<dyn ScheduleDriver>,
    evaluator: CronEvaluator,
    tick_ms: u64,
) -> anyhow::Result<()> {
    let manager = boot(cli, driver).await?;
    info!(tasks = manager.all().len(), tick_ms, "starting schedule worker");

    let worker = Worker::new(manager, Arc::new(InvocationRegistry::new()))
        .evaluator(evaluator)
        .tick(Duration::from_millis(tick_ms));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = tx.send(true);
        }
    });

    worker.run(rx).await?;
    Ok(())
}
