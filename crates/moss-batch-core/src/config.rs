use crate::error::Error;
use config::{Config, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FORMATTER: &str = "default";
pub const DEFAULT_FILTER: &str = "default";

/// Settings for one run. Loaded once, validated, then passed by reference to
/// every component; nothing mutates it afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub current_batch: PathBuf,
    #[serde(default)]
    pub job_dir: Option<PathBuf>,
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub extra_batches: Vec<PathBuf>,
    #[serde(default)]
    pub download: bool,
    #[serde(default = "default_formatter")]
    pub formatter: String,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub functions_file: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_matches")]
    pub max_matches: u32,
    #[serde(default = "default_max_repeats")]
    pub max_repeats: u32,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default = "default_moss_script")]
    pub moss_script: PathBuf,
    #[serde(default = "default_delimiter")]
    pub submission_delimiter: String,
    #[serde(default = "default_override_dir")]
    pub override_dir: String,
    #[serde(default = "default_override_suffix")]
    pub override_suffix: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./moss_jobs")
}

fn default_formatter() -> String {
    DEFAULT_FORMATTER.to_string()
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

fn default_language() -> String {
    "c".to_string()
}

fn default_max_matches() -> u32 {
    250
}

fn default_max_repeats() -> u32 {
    10
}

fn default_moss_script() -> PathBuf {
    PathBuf::from("moss")
}

fn default_delimiter() -> String {
    ".".to_string()
}

fn default_override_dir() -> String {
    "moss_override".to_string()
}

fn default_override_suffix() -> String {
    ".moss".to_string()
}

/// Load a configuration file in any format the `config` crate understands
/// (picked by extension) and validate it.
pub fn load_configuration(path: &Path) -> Result<JobConfig, Error> {
    if !path.is_file() {
        return Err(Error::Invalid(format!(
            "configuration file {} does not exist",
            path.display()
        )));
    }
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .build()?;
    let config = builder.try_deserialize::<JobConfig>()?;
    config.validate()?;
    Ok(config)
}

impl JobConfig {
    /// A config for `current_batch` with every optional field at its default.
    pub fn new(current_batch: impl Into<PathBuf>) -> Self {
        Self {
            current_batch: current_batch.into(),
            job_dir: None,
            base_dir: None,
            output_dir: default_output_dir(),
            extra_batches: Vec::new(),
            download: false,
            formatter: default_formatter(),
            filter: default_filter(),
            functions_file: None,
            language: default_language(),
            max_matches: default_max_matches(),
            max_repeats: default_max_repeats(),
            extensions: Vec::new(),
            file_types: Vec::new(),
            moss_script: default_moss_script(),
            submission_delimiter: default_delimiter(),
            override_dir: default_override_dir(),
            override_suffix: default_override_suffix(),
        }
    }

    /// Precondition checks. Must pass before any job directory is created.
    pub fn validate(&self) -> Result<(), Error> {
        require_dir("current_batch", &self.current_batch)?;
        for batch in &self.extra_batches {
            require_dir("extra_batches", batch)?;
        }
        if let Some(base) = &self.base_dir {
            require_dir("base_dir", base)?;
        }
        if let Some(job) = &self.job_dir {
            require_dir("job_dir", job)?;
        }
        if let Some(functions) = &self.functions_file {
            if !functions.is_file() {
                return Err(Error::Invalid(format!(
                    "functions_file {} does not exist",
                    functions.display()
                )));
            }
        }

        for ext in &self.extensions {
            if !is_valid_extension(ext) {
                return Err(Error::Invalid(format!(
                    "invalid extension '{}' (write extensions without a dot, e.g. \"c\")",
                    ext
                )));
            }
        }
        for kind in &self.file_types {
            if kind != "text" && kind != "binary" {
                return Err(Error::Invalid(format!(
                    "invalid file type '{}' (expected \"text\" or \"binary\")",
                    kind
                )));
            }
        }

        if self.functions_file.is_none()
            && (self.formatter != DEFAULT_FORMATTER || self.filter != DEFAULT_FILTER)
        {
            return Err(Error::Invalid(
                "custom formatter or filter named but no functions_file given".to_string(),
            ));
        }
        if self.submission_delimiter.is_empty() {
            return Err(Error::Invalid(
                "submission_delimiter must not be empty".to_string(),
            ));
        }
        if self.override_dir.is_empty() || self.override_dir.contains(['/', '\\']) {
            return Err(Error::Invalid(format!(
                "override_dir '{}' must be a plain directory name",
                self.override_dir
            )));
        }
        if self.max_matches == 0 || self.max_repeats == 0 {
            return Err(Error::Invalid(
                "max_matches and max_repeats must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Download-only mode: an existing job folder was named.
    pub fn is_download_only(&self) -> bool {
        self.job_dir.is_some()
    }

    /// Every batch submitted in one run, current batch first.
    pub fn batches(&self) -> Vec<&Path> {
        let mut batches = vec![self.current_batch.as_path()];
        batches.extend(self.extra_batches.iter().map(|b| b.as_path()));
        batches
    }
}

fn require_dir(field: &str, path: &Path) -> Result<(), Error> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::Invalid(format!(
            "{} {} is not an existing directory",
            field,
            path.display()
        )))
    }
}

pub fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}
