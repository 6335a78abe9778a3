//! Scanner for the service's result index page.
//!
//! The page is not a documented format. This is a positional text scan pinned
//! to the layout the service has served for years:
//!
//! ```text
//! <TABLE>
//! <TR><TH>File 1<TH>File 2<TH>Lines Matched
//! <TR><TD><A HREF="http://host/results/1/2/match0.html">hw1/alice.3/ (45%)</A>
//!     <TD><A HREF="http://host/results/1/2/match0.html">hw1/bob/ (41%)</A>
//! <TD ALIGN=right>27
//! ...
//! </TABLE>
//! ```
//!
//! One header row, then three lines per match. If the service ever changes
//! this layout the scan fails with [`Error::ResultFormat`] (or, for subtle
//! changes, produces nonsense); there is no way to detect that from here.

use crate::collector::SCRATCH_PREFIX;
use crate::error::Error;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Submission directory. For a known batch this is `<batch>/<submission>`,
    /// whatever subdirectory the service reported; otherwise the reported
    /// directory. Scratch components are removed either way.
    pub path: PathBuf,
    pub percent: u32,
}

impl Participant {
    /// The batch directory holding this submission.
    pub fn batch_dir(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Cut the reported directory back to the submission directory of the
    /// first batch containing it.
    fn resolve(&mut self, batches: &[&Path]) {
        for batch in batches {
            if let Some(dir) = submission_dir(&self.path, batch) {
                self.path = dir;
                return;
            }
        }
    }
}

/// `hw1/alice.3/src` under `hw1` -> `hw1/alice.3`.
fn submission_dir(reported: &Path, batch: &Path) -> Option<PathBuf> {
    let rest = reported.strip_prefix(batch).ok()?;
    let submission = rest.components().next()?;
    Some(batch.join(submission))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub first: Participant,
    pub second: Participant,
    pub lines: u32,
    pub url: String,
}

impl Match {
    /// `http://host/results/1/2/match0.html` -> `("http://host/results/1/2/", "match0")`
    pub fn split_url(&self) -> Option<(&str, &str)> {
        let slash = self.url.rfind('/')?;
        let (base, file) = self.url.split_at(slash + 1);
        let stem = file.strip_suffix(".html").unwrap_or(file);
        if stem.is_empty() {
            return None;
        }
        Some((base, stem))
    }
}

#[derive(Debug, Default)]
pub struct ParsedIndex {
    /// Matches listed on the page, before the batch filter.
    pub total: usize,
    /// Matches with at least one participant in the current batch, in page order.
    pub matches: Vec<Match>,
}

/// Parse the index page, keeping only matches that involve `current_batch`.
/// `other_batches` are only used to name the participants of older batches.
pub fn parse_index(
    html: &str,
    current_batch: &Path,
    other_batches: &[&Path],
) -> Result<ParsedIndex, Error> {
    let mut batches = vec![current_batch];
    batches.extend_from_slice(other_batches);

    let lower = html.to_ascii_lowercase();
    let table_start = lower.find("<table").ok_or_else(|| Error::ResultFormat {
        line: 0,
        reason: "no result table".to_string(),
    })?;
    let body_start = lower[table_start..]
        .find('>')
        .map(|i| table_start + i + 1)
        .ok_or_else(|| Error::ResultFormat {
            line: line_of(html, table_start),
            reason: "unterminated <table> tag".to_string(),
        })?;
    let body_end = lower[body_start..]
        .find("</table>")
        .map(|i| body_start + i)
        .ok_or_else(|| Error::ResultFormat {
            line: line_of(html, table_start),
            reason: "no closing </table>".to_string(),
        })?;

    let first_line = line_of(html, body_start);
    let rows: Vec<(usize, &str)> = html[body_start..body_end]
        .lines()
        .enumerate()
        .map(|(i, l)| (first_line + i, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .skip(1) // header row
        .collect();

    let mut parsed = ParsedIndex::default();
    for triplet in rows.chunks(3) {
        if triplet.len() < 3 {
            return Err(Error::ResultFormat {
                line: triplet[0].0,
                reason: format!("incomplete match row ({} of 3 lines)", triplet.len()),
            });
        }
        parsed.total += 1;

        let (line_a, text_a) = triplet[0];
        let (line_b, text_b) = triplet[1];
        let (line_n, text_n) = triplet[2];

        let url = quoted(text_a).ok_or_else(|| format_error(line_a, "no link"))?;
        let mut first =
            participant(text_a).ok_or_else(|| format_error(line_a, "no participant"))?;
        let mut second =
            participant(text_b).ok_or_else(|| format_error(line_b, "no participant"))?;
        first.resolve(&batches);
        second.resolve(&batches);

        let in_batch = |p: &Participant| p.batch_dir() == Some(current_batch);
        if !in_batch(&first) && !in_batch(&second) {
            continue;
        }

        let lines = text_n
            .rsplit('>')
            .next()
            .and_then(|n| n.trim().parse::<u32>().ok())
            .ok_or_else(|| format_error(line_n, "no matched-line count"))?;

        parsed.matches.push(Match {
            first,
            second,
            lines,
            url: url.to_string(),
        });
    }

    Ok(parsed)
}

fn format_error(line: usize, reason: &str) -> Error {
    Error::ResultFormat {
        line,
        reason: reason.to_string(),
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn quoted(line: &str) -> Option<&str> {
    let open = line.find('"')? + 1;
    let close = line[open..].find('"')? + open;
    Some(&line[open..close])
}

/// `<A HREF="...">hw1/alice.3/ (45%)</A>` -> participant `hw1/alice.3`, 45.
fn participant(line: &str) -> Option<Participant> {
    let after_link = line.find("\">")? + 2;
    let rest = &line[after_link..];
    let paren = rest.rfind(" (")?;
    let percent_end = rest[paren..].find('%')? + paren;
    let percent = rest[paren + 2..percent_end].trim().parse::<u32>().ok()?;

    let reported = rest[..paren].trim();
    if reported.is_empty() {
        return None;
    }
    Some(Participant {
        path: submission_path(reported),
        percent,
    })
}

/// The reported directory without any scratch component.
fn submission_path(reported: &str) -> PathBuf {
    Path::new(reported.trim_end_matches(['/', '\\']))
        .components()
        .filter(|c| {
            !c.as_os_str()
                .to_str()
                .map_or(false, |n| n.starts_with(SCRATCH_PREFIX))
        })
        .collect()
}
