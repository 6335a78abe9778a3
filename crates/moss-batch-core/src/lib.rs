pub mod collector;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod job;
pub mod platform;
pub mod progress;
pub mod results;
pub mod strategy;

pub use config::JobConfig;
pub use engine::{DownloadResult, RunEngine, RunResult, SubmitResult};
pub use error::Error;
pub use fetch::{HttpFetcher, PageFetcher};
pub use job::Job;
pub use progress::{ProgressReporter, SilentReporter};
pub use strategy::Strategies;
