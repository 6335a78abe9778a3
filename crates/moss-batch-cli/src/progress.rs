use indicatif::{ProgressBar, ProgressStyle};
use moss_batch_core::ProgressReporter;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Collect and submit phases: spinner
/// - Download phase: progress bar over retained matches
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_collect_start(&self) {
        self.spinner("Collecting submissions...");
    }

    fn on_collect_complete(&self, submissions: usize, files: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Collected {} files from {} submissions",
            files, submissions
        );
    }

    fn on_submit_start(&self, files: usize) {
        self.spinner(&format!("Submitting {} files, waiting for the server...", files));
    }

    fn on_submit_complete(&self, url: Option<&str>, duration_secs: f64) {
        self.finish_bar();
        match url {
            Some(url) => eprintln!(
                "  \x1b[32m✓\x1b[0m Submitted in {:.2}s: {}",
                duration_secs, url
            ),
            None => eprintln!(
                "  \x1b[31m✗\x1b[0m Submission finished after {:.2}s without a result URL",
                duration_secs
            ),
        }
    }

    fn on_download_start(&self, matches: usize) {
        let pb = ProgressBar::new(matches as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Archiving [{bar:30.cyan/dim}] {pos}/{len} matches {msg}",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_match_archived(&self, done: usize, _total: usize, dir_name: &str) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(done as u64);
                pb.set_message(dir_name.to_string());
            }
        }
    }

    fn on_download_complete(&self, archived: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Archived {} matches in {:.2}s",
            archived, duration_secs
        );
    }
}
