use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "moss-batch")]
#[command(about = "Submit coursework batches to MOSS and archive the results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit the configured batch, or only download when job_dir is set
    Run(ConfigArgs),
    /// Download and archive the results of an existing job
    Download(DownloadArgs),
    /// List the submissions and files that would be submitted
    Collect(ConfigArgs),
    /// Print configuration values
    PrintConfig(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (TOML, YAML or JSON)
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Configuration file (TOML, YAML or JSON)
    pub config: PathBuf,
    /// Job directory to download into, overriding job_dir from the configuration
    #[arg(long)]
    pub job_dir: Option<PathBuf>,
}
