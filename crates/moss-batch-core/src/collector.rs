use crate::config::JobConfig;
use crate::error::Error;
use crate::platform;
use crate::strategy::SubmissionFilter;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name prefix of the scratch directories created inside a submission for
/// override files. The result parser strips such components again.
pub const SCRATCH_PREFIX: &str = ".moss-scratch-";

const SNIFF_LENGTH: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Binary,
}

impl FileKind {
    pub fn parse(name: &str) -> Option<FileKind> {
        match name {
            "text" => Some(FileKind::Text),
            "binary" => Some(FileKind::Binary),
            _ => None,
        }
    }
}

/// A file is binary when its first 8KB contain a NUL byte.
pub fn sniff_kind(path: &Path) -> io::Result<FileKind> {
    let mut f = File::open(path)?;
    let mut buffer = vec![0; SNIFF_LENGTH];
    let bytes_read = f.read(&mut buffer)?;
    if buffer[..bytes_read].contains(&0) {
        Ok(FileKind::Binary)
    } else {
        Ok(FileKind::Text)
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub extensions: Vec<String>,
    pub file_types: Vec<FileKind>,
    pub delimiter: String,
    pub override_dir: String,
    pub override_suffix: String,
}

impl CollectOptions {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            file_types: config
                .file_types
                .iter()
                .filter_map(|t| FileKind::parse(t))
                .collect(),
            delimiter: config.submission_delimiter.clone(),
            override_dir: config.override_dir.clone(),
            override_suffix: config.override_suffix.clone(),
        }
    }
}

/// Split `alice.3` into `("alice", 3)`. The prefix ends at the first
/// delimiter, the suffix starts after the last one; a missing or
/// non-numeric suffix counts as 0.
pub fn split_submission_name<'a>(name: &'a str, delimiter: &str) -> (&'a str, u64) {
    let prefix = match name.find(delimiter) {
        Some(pos) => &name[..pos],
        None => return (name, 0),
    };
    let suffix = name
        .rfind(delimiter)
        .and_then(|pos| name[pos + delimiter.len()..].parse::<u64>().ok())
        .unwrap_or(0);
    (prefix, suffix)
}

/// The latest submission directory of every participant in `batch`.
/// Unreadable entries are logged and skipped.
pub fn latest_submissions(batch: &Path, delimiter: &str) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(batch).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("Error reading batch directory {}: {}", batch.display(), err),
        )
    })?;

    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry in {}: {}", batch.display(), err);
                continue;
            }
        };
        let path = entry.path();
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping non UTF-8 entry {:?} in {}", raw, batch.display());
                continue;
            }
        };
        if name.starts_with('.') {
            continue;
        }
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => names.push((name, path)),
            Ok(_) => debug!("Ignoring non-directory {}", path.display()),
            Err(err) if platform::is_permission_denied(&err) => {
                warn!(
                    "Access denied reading {} ({}): {}",
                    path.display(),
                    platform::describe_permissions(&path),
                    err
                );
            }
            Err(err) => warn!("Error reading metadata for {}: {}", path.display(), err),
        }
    }
    names.sort();

    let mut latest: BTreeMap<String, (u64, PathBuf)> = BTreeMap::new();
    for (name, path) in names {
        let (prefix, suffix) = split_submission_name(&name, delimiter);
        let newer = latest
            .get(prefix)
            .map_or(true, |(best, _)| suffix > *best);
        if newer {
            latest.insert(prefix.to_string(), (suffix, path));
        } else {
            debug!("Superseded submission {}", path.display());
        }
    }

    Ok(latest.into_values().map(|(_, path)| path).collect())
}

/// Everything gathered for one submission run. Scratch copies live until the
/// value is dropped or [`Collection::cleanup`] is called.
#[derive(Debug, Default)]
pub struct Collection {
    pub submissions: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    pub base_files: Vec<PathBuf>,
    scratch: Vec<TempDir>,
}

impl Collection {
    pub fn scratch_dirs(&self) -> Vec<&Path> {
        self.scratch.iter().map(|d| d.path()).collect()
    }

    /// Remove every scratch directory, logging failures.
    pub fn cleanup(self) {
        for dir in self.scratch {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed scratch directory {}", path.display()),
                Err(err) => warn!(
                    "Could not remove scratch directory {}: {}",
                    path.display(),
                    err
                ),
            }
        }
    }
}

pub struct Collector<'a> {
    options: CollectOptions,
    filter: &'a dyn SubmissionFilter,
}

impl<'a> Collector<'a> {
    pub fn new(options: CollectOptions, filter: &'a dyn SubmissionFilter) -> Self {
        Self { options, filter }
    }

    /// Collect the latest submission of every participant of every batch,
    /// plus the base files when a base directory is given.
    pub fn collect(&self, batches: &[&Path], base_dir: Option<&Path>) -> Result<Collection, Error> {
        let mut collection = Collection::default();

        for batch in batches {
            let submissions = latest_submissions(batch, &self.options.delimiter)?;
            info!(
                "{} submissions in batch {}",
                submissions.len(),
                batch.display()
            );
            for submission in submissions {
                self.collect_submission(&submission, &mut collection)?;
                collection.submissions.push(submission);
            }
        }

        if let Some(base) = base_dir {
            collection.base_files = self.collect_base_files(base)?;
            info!(
                "{} base files in {}",
                collection.base_files.len(),
                base.display()
            );
        }

        info!(
            "Collected {} files from {} submissions",
            collection.files.len(),
            collection.submissions.len()
        );
        Ok(collection)
    }

    pub fn collect_submission(
        &self,
        submission: &Path,
        collection: &mut Collection,
    ) -> Result<(), Error> {
        let override_dir = submission.join(&self.options.override_dir);
        if override_dir.is_dir() {
            if let Some((scratch, files)) = self.copy_overrides(submission, &override_dir)? {
                debug!(
                    "{} override files for {}",
                    files.len(),
                    submission.display()
                );
                collection.files.extend(files);
                collection.scratch.push(scratch);
                return Ok(());
            }
        }

        let before = collection.files.len();
        for path in walk_files(submission)? {
            if path.starts_with(&override_dir) {
                continue;
            }
            match self.accepts(&path) {
                Ok(true) if self.filter.include(submission, &path) => {
                    collection.files.push(path)
                }
                Ok(_) => {}
                Err(err) if platform::is_permission_denied(&err) => {
                    warn!(
                        "Access denied reading {} ({}): {}",
                        path.display(),
                        platform::describe_permissions(&path),
                        err
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        if collection.files.len() == before {
            warn!("No files selected from {}", submission.display());
        }
        Ok(())
    }

    /// Base files get the extension and type filters, not the user filter.
    pub fn collect_base_files(&self, base_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        for path in walk_files(base_dir)? {
            match self.accepts(&path) {
                Ok(true) => files.push(path),
                Ok(false) => {}
                Err(err) if platform::is_permission_denied(&err) => {
                    warn!(
                        "Access denied reading {} ({}): {}",
                        path.display(),
                        platform::describe_permissions(&path),
                        err
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(files)
    }

    /// Extension / file-type allow-lists. Either list matching is enough;
    /// both empty accepts everything. Fails when the file cannot be opened.
    fn accepts(&self, path: &Path) -> io::Result<bool> {
        if self.options.extensions.is_empty() && self.options.file_types.is_empty() {
            File::open(path)?;
            return Ok(true);
        }

        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.options.extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        if extension_ok {
            File::open(path)?;
            return Ok(true);
        }

        if self.options.file_types.is_empty() {
            return Ok(false);
        }
        let kind = sniff_kind(path)?;
        Ok(self.options.file_types.contains(&kind))
    }

    /// Copy the manual-edit files into a scratch directory inside the
    /// submission, dropping the reserved suffix from their names. `None` when
    /// the submission is read-only; its own files are submitted instead.
    fn copy_overrides(
        &self,
        submission: &Path,
        override_dir: &Path,
    ) -> Result<Option<(TempDir, Vec<PathBuf>)>, Error> {
        let scratch = match tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(submission)
        {
            Ok(scratch) => scratch,
            Err(err) if platform::is_permission_denied(&err) => {
                warn!(
                    "Access denied creating a scratch directory in {} ({}): {}; ignoring {}",
                    submission.display(),
                    platform::describe_permissions(submission),
                    err,
                    override_dir.display()
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();

        for path in walk_files(override_dir)? {
            let relative = path.strip_prefix(override_dir).unwrap_or(&path);
            let file_name = match relative.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            let local_name = file_name
                .strip_suffix(self.options.override_suffix.as_str())
                .filter(|n| !n.is_empty())
                .unwrap_or(file_name);

            let dest_dir = match relative.parent() {
                Some(parent) => scratch.path().join(parent),
                None => scratch.path().to_path_buf(),
            };
            let dest = dest_dir.join(local_name);

            fs::create_dir_all(&dest_dir)?;
            match fs::copy(&path, &dest) {
                Ok(_) => files.push(dest),
                Err(err) if platform::is_permission_denied(&err) => {
                    warn!(
                        "Access denied copying override {} ({}): {}",
                        path.display(),
                        platform::describe_permissions(&path),
                        err
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        if files.is_empty() {
            warn!("Override directory {} is empty", override_dir.display());
        }
        Ok(Some((scratch, files)))
    }
}

/// Regular files under `root`, sorted by name. Unreadable directories are
/// logged and skipped; leftover scratch directories are ignored.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map_or(false, |n| n.starts_with(SCRATCH_PREFIX))
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let denied = err
                    .io_error()
                    .map_or(false, platform::is_permission_denied);
                if denied {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(
                        "Access denied reading directory {} ({}): {}",
                        path.display(),
                        platform::describe_permissions(&path),
                        err
                    );
                    continue;
                }
                return Err(io::Error::from(err).into());
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
