use crate::collector::Collection;
use crate::config::JobConfig;
use crate::error::Error;
use chrono::{DateTime, Duration, Local};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The service deletes results this long after submission.
pub const RESULT_LIFETIME_DAYS: i64 = 14;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn expiration_estimate(submitted_at: DateTime<Local>) -> DateTime<Local> {
    submitted_at + Duration::days(RESULT_LIFETIME_DAYS)
}

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Argument list for the external submission script.
#[derive(Debug, Clone)]
pub struct SubmissionCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

#[derive(Debug)]
pub struct SubmissionOutput {
    pub success: bool,
    pub status: String,
    /// stdout followed by stderr.
    pub output: String,
}

impl SubmissionCommand {
    pub fn build(config: &JobConfig, collection: &Collection, submitted_at: DateTime<Local>) -> Self {
        let batch_name = config
            .current_batch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.current_batch.to_string_lossy().into_owned());
        let comment = format!(
            "{} submitted {} expires around {}",
            batch_name,
            format_timestamp(submitted_at),
            format_timestamp(expiration_estimate(submitted_at)),
        );

        let mut args: Vec<OsString> = vec![
            "-l".into(),
            config.language.clone().into(),
            "-m".into(),
            config.max_repeats.to_string().into(),
            "-n".into(),
            config.max_matches.to_string().into(),
            "-c".into(),
            comment.into(),
            "-d".into(),
        ];
        for base in &collection.base_files {
            args.push("-b".into());
            args.push(base.as_os_str().to_owned());
        }
        args.extend(collection.files.iter().map(|f| f.as_os_str().to_owned()));

        Self {
            program: config.moss_script.clone(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut text = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            text.push(' ');
            if arg.contains(char::is_whitespace) {
                text.push('"');
                text.push_str(&arg);
                text.push('"');
            } else {
                text.push_str(&arg);
            }
        }
        text
    }

    /// Run the script to completion and capture everything it printed.
    pub fn run(&self) -> Result<SubmissionOutput, Error> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!("Error running {}: {}", self.program.display(), err),
                )
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        Ok(SubmissionOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            output: combined,
        })
    }
}

/// The script prints the result URL as its last `http` line.
pub fn extract_result_url(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_collection() -> Collection {
        let mut collection = Collection::default();
        collection.submissions = vec![PathBuf::from("hw1/alice.3"), PathBuf::from("hw1/bob")];
        collection.files = vec![
            PathBuf::from("hw1/alice.3/main.c"),
            PathBuf::from("hw1/bob/main.c"),
        ];
        collection.base_files = vec![PathBuf::from("base/skeleton.c")];
        collection
    }

    #[test]
    fn test_build_arguments() {
        let mut config = JobConfig::new("hw1");
        config.language = "python".to_string();
        config.max_repeats = 5;
        config.max_matches = 100;
        let at = Local.with_ymd_and_hms(2026, 1, 5, 9, 30, 0).unwrap();

        let cmd = SubmissionCommand::build(&config, &sample_collection(), at);
        let args: Vec<String> = cmd
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.program(), Path::new("moss"));
        assert_eq!(&args[..6], &["-l", "python", "-m", "5", "-n", "100"]);
        assert_eq!(args[6], "-c");
        assert!(args[7].contains("2026-01-05 09:30"));
        assert!(args[7].contains("2026-01-19 09:30"));
        assert_eq!(args[8], "-d");
        assert_eq!(&args[9..11], &["-b", "base/skeleton.c"]);
        assert_eq!(&args[11..], &["hw1/alice.3/main.c", "hw1/bob/main.c"]);
        assert!(cmd.display().contains("\"hw1 submitted"));
    }

    #[test]
    fn test_extract_result_url() {
        let output = "Checking files . . .\nOK\nUploading hw1/bob/main.c ...done.\nQuery submitted.  Waiting for the server's response.\nhttp://moss.stanford.edu/results/4/123456789\n";
        assert_eq!(
            extract_result_url(output).as_deref(),
            Some("http://moss.stanford.edu/results/4/123456789")
        );
        assert_eq!(extract_result_url("Error: bad language\n"), None);
    }
}
