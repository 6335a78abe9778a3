use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Functions file error: {0}")]
    FunctionsFile(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Summary write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected result page format at line {line}: {reason}")]
    ResultFormat { line: usize, reason: String },

    #[error("Submission produced no result URL, see {}", log.display())]
    MissingResultUrl { log: PathBuf },

    #[error("{0}")]
    Other(String),
}
