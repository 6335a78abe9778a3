use crate::command::format_timestamp;
use crate::error::Error;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_FILE: &str = "moss-batch.log";
pub const URL_FILE: &str = "url.txt";
pub const RESULTS_DIR: &str = "results";

/// One run's working directory.
#[derive(Debug, Clone)]
pub struct Job {
    dir: PathBuf,
}

impl Job {
    /// Create `<output_dir>/<timestamp>-<batch name>` and copy the
    /// configuration file into it.
    pub fn create(
        output_dir: &Path,
        batch: &Path,
        config_file: &Path,
        at: DateTime<Local>,
    ) -> Result<Job, Error> {
        let batch_name = batch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch".to_string());
        let dir = output_dir.join(format!("{}-{}", at.format("%Y%m%d-%H%M%S"), batch_name));

        fs::create_dir_all(output_dir)?;
        fs::create_dir(&dir).map_err(|err| {
            std::io::Error::new(
                err.kind(),
                format!("Error creating job directory {}: {}", dir.display(), err),
            )
        })?;

        let config_name = match config_file.extension() {
            Some(ext) => format!("config.{}", ext.to_string_lossy()),
            None => "config".to_string(),
        };
        fs::copy(config_file, dir.join(config_name))?;
        debug!("Created job directory {}", dir.display());

        Ok(Job { dir })
    }

    /// An existing job directory, for download-only runs.
    pub fn open(dir: &Path) -> Result<Job, Error> {
        if !dir.is_dir() {
            return Err(Error::Invalid(format!(
                "job directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Job {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn url_path(&self) -> PathBuf {
        self.dir.join(URL_FILE)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.dir.join(RESULTS_DIR)
    }

    pub fn record_url(&self, url: &str, expires: DateTime<Local>) -> Result<(), Error> {
        fs::write(
            self.url_path(),
            format!("{}\nexpires around {}\n", url, format_timestamp(expires)),
        )?;
        Ok(())
    }

    pub fn read_url(&self) -> Result<String, Error> {
        let path = self.url_path();
        let text = fs::read_to_string(&path).map_err(|err| {
            Error::Invalid(format!(
                "no result URL recorded in {}: {}",
                path.display(),
                err
            ))
        })?;
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Invalid(format!("{} is empty", path.display())))
    }
}
