mod assets;
mod config;
mod executor;
mod jobspec;
mod logs;
mod runner;
mod shell;
mod submit;
mod utils;

use anyhow::{Context, Result};
use config::{CliArgs, ConnectionConfig, ExecutionMode, JobConfig, WorkspaceLayout};
use log::{error, info};

fn main() {
    let args = CliArgs::parse_args();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.get_log_level()),
    )
    .init();

    match run(&args) {
        Ok(true) => info!("Job passed"),
        Ok(false) => {
            error!("Job failed");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: &CliArgs) -> Result<bool> {
    let mode = args
        .get_execution_mode()
        .context("select an execution mode: --direct or --queued")?;
    let cfg = JobConfig::from_file(&args.job_config)?;
    info!("Loaded job config: suite {}, test {}", cfg.suite, cfg.test);
    let layout = WorkspaceLayout::new(&args.root_dir);

    match mode {
        ExecutionMode::Direct => {
            let conn = match &args.connection_config {
                Some(path) => ConnectionConfig::from_file(path)?,
                None => ConnectionConfig::default(),
            };
            runner::run_direct(args, &cfg, &layout, &conn)
        }
        ExecutionMode::Queued => runner::run_queued(args, &cfg, &layout),
    }
}
