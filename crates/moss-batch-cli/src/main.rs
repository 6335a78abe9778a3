mod commands;
mod logging;
mod progress;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use moss_batch_core::config::load_configuration;
use moss_batch_core::{strategy, HttpFetcher, Job, JobConfig, RunEngine, RunResult, Strategies};
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Run(args)) => run(&args.config, None, false),
        Some(Commands::Download(args)) => run(&args.config, args.job_dir, true),
        Some(Commands::Collect(args)) => run_collect(&args.config),
        Some(Commands::PrintConfig(args)) => {
            load(&args.config, None).map(|(config, _)| println!("Configuration: {:#?}", config))
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        process::exit(1);
    }
}

/// Load, validate and resolve everything that can fail before a job
/// directory exists.
fn load(config_path: &Path, job_dir: Option<PathBuf>) -> Result<(JobConfig, Strategies)> {
    let mut config = load_configuration(config_path)
        .with_context(|| format!("loading configuration {}", config_path.display()))?;
    if job_dir.is_some() {
        config.job_dir = job_dir;
        config.validate()?;
    }
    let strategies = strategy::resolve(&config).context("resolving formatter and filter")?;
    Ok((config, strategies))
}

fn run(config_path: &Path, job_dir: Option<PathBuf>, download_only: bool) -> Result<()> {
    let (config, strategies) = load(config_path, job_dir)?;
    if download_only && !config.is_download_only() {
        bail!("download needs a job directory: pass --job-dir or set job_dir in the configuration");
    }

    let job = match &config.job_dir {
        Some(dir) => Job::open(dir)?,
        None => Job::create(
            &config.output_dir,
            &config.current_batch,
            config_path,
            Local::now(),
        )?,
    };

    let _guard = logging::init_logger(&job.log_path());
    info!("Job directory {}", job.dir().display());

    let fetcher = HttpFetcher::new()?;
    let reporter = CliReporter::new();
    let engine = RunEngine::new(&config, &strategies);

    match engine.run(&job, &fetcher, &reporter) {
        Ok(result) => {
            print_result(&job, &result);
            Ok(())
        }
        Err(err) => {
            error!("Run failed: {}", err);
            Err(anyhow::Error::new(err).context(format!("see {}", job.log_path().display())))
        }
    }
}

fn run_collect(config_path: &Path) -> Result<()> {
    let (config, strategies) = load(config_path, None)?;
    logging::init_console_logger();

    let engine = RunEngine::new(&config, &strategies);
    let collection = engine.collect()?;

    for submission in &collection.submissions {
        println!("{}", submission.display().to_string().cyan());
    }
    for base in &collection.base_files {
        println!("  base  {}", base.display());
    }
    for file in &collection.files {
        println!("  file  {}", file.display());
    }
    println!(
        "{} submissions, {} files, {} base files",
        format!("{}", collection.submissions.len()).green(),
        format!("{}", collection.files.len()).green(),
        format!("{}", collection.base_files.len()).green(),
    );

    collection.cleanup();
    Ok(())
}

fn print_result(job: &Job, result: &RunResult) {
    if let Some(submit) = &result.submit {
        info!(
            "Submitted {} files from {} submissions in {}: {}",
            format!("{}", submit.files).green(),
            format!("{}", submit.submissions).green(),
            format!("{:.2}s", submit.duration.as_secs_f64()).green(),
            submit.url.cyan(),
        );
    }
    if let Some(download) = &result.download {
        info!(
            "{} matches on the index, {} involve the current batch, {} archived ({} pages)",
            format!("{}", download.total_matches).cyan(),
            format!("{}", download.retained_matches).red(),
            format!("{}", download.archived_matches).green(),
            download.pages,
        );
        info!("Results in {}", download.results_dir.display());
    } else {
        info!(
            "Results not downloaded; run `moss-batch download <config> --job-dir {}` before they expire",
            job.dir().display()
        );
    }
}
