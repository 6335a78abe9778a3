use super::archive::match_dir_name;
use super::parser::Match;
use crate::error::Error;
use crate::strategy::IdentifierFormatter;
use std::io::Write;
use std::path::Path;

pub const SUMMARY_FILE: &str = "summary.tsv";

pub const HEADER: [&str; 7] = [
    "User 1",
    "Percent 1",
    "User 2",
    "Percent 2",
    "Lines Matched",
    "URL",
    "Local Directory",
];

/// One row per match, largest matched-line count first; ties keep page order.
/// `archived[i]` tells whether `matches[i]` has a local directory. Rows
/// without one leave the last column empty.
pub fn write_summary<W: Write>(
    writer: W,
    matches: &[Match],
    archived: &[bool],
    formatter: &dyn IdentifierFormatter,
) -> Result<(), Error> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    tsv.write_record(HEADER)?;

    let mut rows: Vec<(&Match, bool)> = matches
        .iter()
        .zip(archived.iter().copied().chain(std::iter::repeat(false)))
        .collect();
    rows.sort_by(|a, b| b.0.lines.cmp(&a.0.lines));

    for (m, is_archived) in rows {
        let first = formatter.format(&m.first.path);
        let second = formatter.format(&m.second.path);
        let dir_name = if is_archived {
            match_dir_name(&first, &second)
        } else {
            String::new()
        };
        tsv.write_record([
            first,
            m.first.percent.to_string(),
            second,
            m.second.percent.to_string(),
            m.lines.to_string(),
            m.url.clone(),
            dir_name,
        ])?;
    }
    tsv.flush()?;
    Ok(())
}

pub fn write_summary_file(
    results_dir: &Path,
    matches: &[Match],
    archived: &[bool],
    formatter: &dyn IdentifierFormatter,
) -> Result<(), Error> {
    let file = std::fs::File::create(results_dir.join(SUMMARY_FILE))?;
    write_summary(file, matches, archived, formatter)
}
