/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif spinners and bars.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_collect_start(&self) {}
    fn on_collect_complete(&self, _submissions: usize, _files: usize) {}
    fn on_submit_start(&self, _files: usize) {}
    fn on_submit_complete(&self, _url: Option<&str>, _duration_secs: f64) {}
    fn on_download_start(&self, _matches: usize) {}
    fn on_match_archived(&self, _done: usize, _total: usize, _dir_name: &str) {}
    fn on_download_complete(&self, _archived: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
