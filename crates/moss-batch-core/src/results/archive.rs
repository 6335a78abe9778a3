use super::parser::Match;
use crate::error::Error;
use crate::fetch::PageFetcher;
use crate::strategy::IdentifierFormatter;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Local name of the frame page that ties the other three together.
pub const PRIMARY_PAGE: &str = "OPEN_ME.html";

/// Suffixes of the four pages the service serves per match.
pub const PAGE_SUFFIXES: [&str; 4] = ["", "-0", "-1", "-top"];

pub fn match_dir_name(first: &str, second: &str) -> String {
    format!("{}__{}", path_safe(first), path_safe(second))
}

fn path_safe(identifier: &str) -> String {
    identifier.replace(['/', '\\'], "_")
}

/// Local name for the page with `suffix`.
pub fn local_page_name(suffix: &str, first: &str, second: &str) -> String {
    match suffix {
        "" => PRIMARY_PAGE.to_string(),
        "-0" => format!("0-{}.html", path_safe(first)),
        "-1" => format!("1-{}.html", path_safe(second)),
        other => format!("{}.html", other.trim_start_matches('-')),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMatch {
    pub dir_name: String,
    pub pages: usize,
}

pub struct Archiver<'a> {
    fetcher: &'a dyn PageFetcher,
    formatter: &'a dyn IdentifierFormatter,
}

impl<'a> Archiver<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, formatter: &'a dyn IdentifierFormatter) -> Self {
        Self { fetcher, formatter }
    }

    pub fn identifiers(&self, m: &Match) -> (String, String) {
        (
            self.formatter.format(&m.first.path),
            self.formatter.format(&m.second.path),
        )
    }

    pub fn dir_name(&self, m: &Match) -> String {
        let (first, second) = self.identifiers(m);
        match_dir_name(&first, &second)
    }

    /// Download the four pages of `m` into their own directory under
    /// `results_dir` and make them browsable offline. Pages that fail to
    /// download are logged and left out.
    pub fn archive_match(&self, m: &Match, results_dir: &Path) -> Result<ArchivedMatch, Error> {
        let (base_url, stem) = m.split_url().ok_or_else(|| {
            Error::Other(format!("cannot split match URL '{}'", m.url))
        })?;
        let (first, second) = self.identifiers(m);
        let dir_name = match_dir_name(&first, &second);
        let dir = results_dir.join(&dir_name);
        fs::create_dir_all(&dir)?;

        let mut renames: Vec<(String, String)> = Vec::new();
        for suffix in PAGE_SUFFIXES {
            let remote_name = format!("{}{}.html", stem, suffix);
            let url = format!("{}{}", base_url, remote_name);
            match self.fetcher.fetch(&url) {
                Ok(body) => {
                    fs::write(dir.join(&remote_name), body)?;
                    renames.push((remote_name, local_page_name(suffix, &first, &second)));
                }
                Err(err) => warn!("Skipping {}: {}", url, err),
            }
        }

        rewrite_and_rename(&dir, base_url, &renames)?;
        debug!("Archived {} pages into {}", renames.len(), dir.display());

        Ok(ArchivedMatch {
            dir_name,
            pages: renames.len(),
        })
    }
}

/// Rewrite every file in `renames` for local browsing, then rename them.
/// All contents are rewritten with the full map before the first rename.
pub fn rewrite_and_rename(
    dir: &Path,
    base_url: &str,
    renames: &[(String, String)],
) -> Result<(), Error> {
    for (old, _) in renames {
        let path = dir.join(old);
        let content = fs::read_to_string(&path)?;
        fs::write(&path, rewrite_links(&content, base_url, renames))?;
    }
    for (old, new) in renames {
        fs::rename(dir.join(old), dir.join(new))?;
    }
    Ok(())
}

/// Strip `base_url` and replace every old file name with its new one in a
/// single left-to-right pass, so replaced text is never matched again.
pub fn rewrite_links(content: &str, base_url: &str, renames: &[(String, String)]) -> String {
    let content = if base_url.is_empty() {
        content.to_string()
    } else {
        content.replace(base_url, "")
    };

    let mut by_length: Vec<&(String, String)> = renames.iter().collect();
    by_length.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(content.len());
    let mut rest = content.as_str();
    'scan: while let Some(ch) = rest.chars().next() {
        for (old, new) in &by_length {
            if !old.is_empty() && rest.starts_with(old.as_str()) {
                out.push_str(new);
                rest = &rest[old.len()..];
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}
