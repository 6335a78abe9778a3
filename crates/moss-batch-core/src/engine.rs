use crate::collector::{CollectOptions, Collection, Collector};
use crate::command::{expiration_estimate, extract_result_url, SubmissionCommand};
use crate::config::JobConfig;
use crate::error::Error;
use crate::fetch::PageFetcher;
use crate::job::Job;
use crate::progress::ProgressReporter;
use crate::results::{parse_index, write_summary_file, Archiver};
use crate::strategy::Strategies;
use chrono::Local;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct RunEngine<'a> {
    config: &'a JobConfig,
    strategies: &'a Strategies,
}

#[derive(Debug)]
pub struct SubmitResult {
    pub url: String,
    pub submissions: usize,
    pub files: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct DownloadResult {
    pub results_dir: PathBuf,
    /// Matches listed on the index page.
    pub total_matches: usize,
    /// Matches involving the current batch.
    pub retained_matches: usize,
    pub archived_matches: usize,
    pub pages: usize,
    pub duration: Duration,
}

#[derive(Debug, Default)]
pub struct RunResult {
    pub submit: Option<SubmitResult>,
    pub download: Option<DownloadResult>,
}

impl<'a> RunEngine<'a> {
    pub fn new(config: &'a JobConfig, strategies: &'a Strategies) -> Self {
        Self { config, strategies }
    }

    /// Submit, then download when configured to; or only download when the
    /// configuration names an existing job.
    pub fn run(
        &self,
        job: &Job,
        fetcher: &dyn PageFetcher,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, Error> {
        let mut result = RunResult::default();
        if self.config.is_download_only() {
            info!("Download-only run for job {}", job.dir().display());
        } else {
            result.submit = Some(self.submit(job, reporter)?);
            if !self.config.download {
                return Ok(result);
            }
        }
        result.download = Some(self.download(job, fetcher, reporter)?);
        Ok(result)
    }

    /// Latest submissions of every batch plus the base files.
    pub fn collect(&self) -> Result<Collection, Error> {
        let collector = Collector::new(
            CollectOptions::from_config(self.config),
            self.strategies.filter.as_ref(),
        );
        collector.collect(&self.config.batches(), self.config.base_dir.as_deref())
    }

    pub fn submit(&self, job: &Job, reporter: &dyn ProgressReporter) -> Result<SubmitResult, Error> {
        reporter.on_collect_start();
        let collection = self.collect()?;
        reporter.on_collect_complete(collection.submissions.len(), collection.files.len());

        if collection.files.is_empty() {
            return Err(Error::Other("no files collected, nothing to submit".to_string()));
        }

        let submitted_at = Local::now();
        let command = SubmissionCommand::build(self.config, &collection, submitted_at);
        let submissions = collection.submissions.len();
        let files = collection.files.len();
        info!("Submitting {} files from {} submissions", files, submissions);
        debug!("Command: {}", command.display());

        reporter.on_submit_start(files);
        let start = Instant::now();
        let outcome = command.run();
        // scratch copies must not outlive the submission, whatever happened
        collection.cleanup();
        let output = outcome?;
        let duration = start.elapsed();

        for line in output.output.lines() {
            info!("moss: {}", line);
        }
        if !output.success {
            warn!("Submission script exited with {}", output.status);
        }

        let url = extract_result_url(&output.output);
        reporter.on_submit_complete(url.as_deref(), duration.as_secs_f64());
        let url = url.ok_or_else(|| {
            error!("No result URL in submission output");
            Error::MissingResultUrl {
                log: job.log_path(),
            }
        })?;

        job.record_url(&url, expiration_estimate(submitted_at))?;
        info!("Results at {}", url);

        Ok(SubmitResult {
            url,
            submissions,
            files,
            duration,
        })
    }

    /// Fetch the job's result index and archive every match involving the
    /// current batch.
    pub fn download(
        &self,
        job: &Job,
        fetcher: &dyn PageFetcher,
        reporter: &dyn ProgressReporter,
    ) -> Result<DownloadResult, Error> {
        let start = Instant::now();
        let url = job.read_url()?;
        info!("Fetching result index {}", url);
        let index = fetcher.fetch(&url).map_err(|err| {
            error!("Could not fetch result index {}: {}", url, err);
            err
        })?;

        let batches = self.config.batches();
        let parsed = parse_index(&index, &self.config.current_batch, &batches[1..])?;
        info!(
            "{} matches on the index, {} involve {}",
            parsed.total,
            parsed.matches.len(),
            self.config.current_batch.display()
        );

        let results_dir = job.results_dir();
        fs::create_dir_all(&results_dir)?;

        let archiver = Archiver::new(fetcher, self.strategies.formatter.as_ref());
        let total = parsed.matches.len();
        reporter.on_download_start(total);

        let mut archived = vec![false; total];
        let mut pages = 0;
        for (i, m) in parsed.matches.iter().enumerate() {
            match archiver.archive_match(m, &results_dir) {
                Ok(done) => {
                    archived[i] = true;
                    pages += done.pages;
                    reporter.on_match_archived(i + 1, total, &done.dir_name);
                }
                Err(err) => {
                    error!("Skipping match {}: {}", m.url, err);
                    reporter.on_match_archived(i + 1, total, &archiver.dir_name(m));
                }
            }
        }
        let archived_matches = archived.iter().filter(|a| **a).count();

        write_summary_file(
            &results_dir,
            &parsed.matches,
            &archived,
            self.strategies.formatter.as_ref(),
        )?;

        let duration = start.elapsed();
        reporter.on_download_complete(archived_matches, duration.as_secs_f64());
        info!(
            "Archived {} matches ({} pages) into {}",
            archived_matches,
            pages,
            results_dir.display()
        );

        Ok(DownloadResult {
            results_dir,
            total_matches: parsed.total,
            retained_matches: total,
            archived_matches,
            pages,
            duration,
        })
    }
}
