use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use moss_batch_core::results::archive::{rewrite_and_rename, PRIMARY_PAGE};
use moss_batch_core::results::summary::SUMMARY_FILE;
use moss_batch_core::results::{parse_index, Archiver};
use moss_batch_core::strategy::UnderscoreFormatter;
use moss_batch_core::{Error, Job, JobConfig, PageFetcher, RunEngine, SilentReporter, Strategies};

const INDEX_URL: &str = "http://moss.stanford.edu/results/4/123456789";
const BASE: &str = "http://moss.stanford.edu/results/4/123456789/";

/// Serves canned pages; anything else is a 404.
struct FakeFetcher {
    pages: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn serve(&mut self, url: &str, body: String) {
        self.pages.insert(url.to_string(), body);
    }

    /// Serve the four pages of match `n`, cross-linked the way the service does.
    fn serve_match(&mut self, n: usize) {
        let stem = format!("match{}", n);
        self.serve(
            &format!("{BASE}{stem}.html"),
            format!(
                "<HTML><FRAMESET ROWS=\"150,*\"><FRAME SRC=\"{stem}-top.html\" NAME=\"top\">\n\
                 <FRAMESET COLS=\"50%,50%\"><FRAME SRC=\"{stem}-0.html\" NAME=\"0\">\
                 <FRAME SRC=\"{stem}-1.html\" NAME=\"1\"></FRAMESET></FRAMESET></HTML>\n"
            ),
        );
        self.serve(
            &format!("{BASE}{stem}-top.html"),
            format!(
                "<TABLE><TR><TD><A HREF=\"{stem}-0.html#0\" TARGET=\"0\">1-20</A>\n\
                 <TD><A HREF=\"{BASE}{stem}-1.html#0\" TARGET=\"1\">3-22</A></TABLE>\n"
            ),
        );
        self.serve(
            &format!("{BASE}{stem}-0.html"),
            format!("<PRE><A HREF=\"{BASE}{stem}-1.html#0\" TARGET=\"1\">int main</A></PRE>\n"),
        );
        self.serve(
            &format!("{BASE}{stem}-1.html"),
            format!("<PRE><A HREF=\"{stem}-0.html#0\" TARGET=\"0\">int main</A></PRE>\n"),
        );
    }
}

impl PageFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<String, Error> {
        self.requests.borrow_mut().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| Error::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn index(rows: &[(&str, u32, &str, u32, u32)]) -> String {
    let mut html = String::from(
        "<HTML>\n<BODY>\nMoss Results<p>\n<HR>\n<TABLE>\n<TR><TH>File 1<TH>File 2<TH>Lines Matched\n",
    );
    for (i, (a, pa, b, pb, lines)) in rows.iter().enumerate() {
        html.push_str(&format!(
            "<TR><TD><A HREF=\"{BASE}match{i}.html\">{a}/ ({pa}%)</A>\n    <TD><A HREF=\"{BASE}match{i}.html\">{b}/ ({pb}%)</A>\n<TD ALIGN=right>{lines}\n"
        ));
    }
    html.push_str("</TABLE>\n<HR>\n</BODY>\n</HTML>\n");
    html
}

/// Every quoted `*.html` target (anchor removed) in `content`.
fn link_targets(content: &str) -> Vec<String> {
    content
        .split('"')
        .skip(1)
        .step_by(2)
        .map(|q| q.split('#').next().unwrap_or(q))
        .filter(|q| q.ends_with(".html"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_archive_round_trip_links_resolve_locally() {
    let tmp = tempdir().unwrap();
    let mut fetcher = FakeFetcher::new();
    fetcher.serve_match(0);
    let html = index(&[("hw1/alice.3", 88, "hw1/bob", 87, 412)]);
    let parsed = parse_index(&html, Path::new("hw1"), &[]).unwrap();

    let formatter = UnderscoreFormatter;
    let archiver = Archiver::new(&fetcher, &formatter);
    let archived = archiver.archive_match(&parsed.matches[0], tmp.path()).unwrap();

    assert_eq!(archived.dir_name, "hw1_alice.3__hw1_bob");
    assert_eq!(archived.pages, 4);

    let dir = tmp.path().join(&archived.dir_name);
    let mut names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["0-hw1_alice.3.html", "1-hw1_bob.html", PRIMARY_PAGE, "top.html"]
    );

    for name in &names {
        let content = fs::read_to_string(dir.join(name)).unwrap();
        assert!(!content.contains("match0"), "{} still names a remote page", name);
        assert!(!content.contains(BASE), "{} still links to the server", name);
        for target in link_targets(&content) {
            assert!(
                dir.join(&target).is_file(),
                "{} links to missing {}",
                name,
                target
            );
        }
    }
}

#[test]
fn test_rewrite_before_rename_with_known_map() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    // each page links to itself and to the next one
    let names = ["p.html", "p-0.html", "p-1.html", "p-top.html"];
    for (i, name) in names.iter().enumerate() {
        let next = names[(i + 1) % names.len()];
        fs::write(
            dir.join(name),
            format!("<A HREF=\"{name}\">self</A><A HREF=\"http://x/y/{next}\">next</A>"),
        )
        .unwrap();
    }
    let renames: Vec<(String, String)> = names
        .iter()
        .zip(["main.html", "left.html", "right.html", "top.html"])
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

    rewrite_and_rename(dir, "http://x/y/", &renames).unwrap();

    for (old, new) in &renames {
        assert!(!dir.join(old).exists());
        let content = fs::read_to_string(dir.join(new)).unwrap();
        let targets = link_targets(&content);
        assert_eq!(targets.len(), 2);
        assert_eq!(&targets[0], new);
        for target in targets {
            assert!(dir.join(&target).is_file());
        }
        assert!(!content.contains("http://x/y/"));
        for (old_name, _) in &renames {
            assert!(!content.contains(&format!("\"{}\"", old_name)));
        }
    }
}

#[test]
fn test_failed_page_is_skipped() {
    let tmp = tempdir().unwrap();
    let mut fetcher = FakeFetcher::new();
    fetcher.serve_match(0);
    fetcher.pages.remove(&format!("{BASE}match0-1.html"));
    let html = index(&[("hw1/alice.3", 88, "hw1/bob", 87, 412)]);
    let parsed = parse_index(&html, Path::new("hw1"), &[]).unwrap();

    let formatter = UnderscoreFormatter;
    let archived = Archiver::new(&fetcher, &formatter)
        .archive_match(&parsed.matches[0], tmp.path())
        .unwrap();

    assert_eq!(archived.pages, 3);
    let dir = tmp.path().join(&archived.dir_name);
    assert!(dir.join(PRIMARY_PAGE).is_file());
    assert!(!dir.join("1-hw1_bob.html").exists());
    assert_eq!(fetcher.requests.borrow().len(), 4);
}

#[test]
fn test_download_writes_sorted_summary_and_skips_other_batches() {
    let tmp = tempdir().unwrap();
    let job = Job::open(tmp.path()).unwrap();
    job.record_url(INDEX_URL, chrono::Local::now()).unwrap();

    let mut fetcher = FakeFetcher::new();
    fetcher.serve(
        INDEX_URL,
        index(&[
            ("hw1/alice.3", 30, "hw1/bob", 31, 5),
            ("old/erin", 90, "old/frank.4", 91, 300),
            ("hw1/carol.2", 70, "old/erin", 65, 50),
            ("hw1/dave", 50, "hw1/bob", 45, 20),
        ]),
    );
    for n in 0..4 {
        fetcher.serve_match(n);
    }

    let mut config = JobConfig::new("hw1");
    config.job_dir = Some(tmp.path().to_path_buf());
    let strategies = Strategies::default();
    let engine = RunEngine::new(&config, &strategies);
    let result = engine.run(&job, &fetcher, &SilentReporter).unwrap();

    assert!(result.submit.is_none());
    let download = result.download.unwrap();
    assert_eq!(download.total_matches, 4);
    assert_eq!(download.retained_matches, 3);
    assert_eq!(download.archived_matches, 3);
    assert_eq!(download.pages, 12);

    let results = job.results_dir();
    let summary = fs::read_to_string(results.join(SUMMARY_FILE)).unwrap();
    let rows: Vec<Vec<&str>> = summary
        .lines()
        .skip(1)
        .map(|l| l.split('\t').collect())
        .collect();
    let counts: Vec<&str> = rows.iter().map(|r| r[4]).collect();
    assert_eq!(counts, vec!["50", "20", "5"]);
    assert_eq!(rows[0][6], "hw1_carol.2__old_erin");

    assert!(!summary.contains("frank"));
    assert!(!results.join("old_erin__old_frank.4").exists());
    assert!(results.join("hw1_carol.2__old_erin").join(PRIMARY_PAGE).is_file());
    assert!(!fetcher
        .requests
        .borrow()
        .iter()
        .any(|u| u.contains("match1")));
}

#[test]
fn test_download_keeps_nested_directories_and_marks_failed_matches() {
    let tmp = tempdir().unwrap();
    let job = Job::open(tmp.path()).unwrap();
    job.record_url(INDEX_URL, chrono::Local::now()).unwrap();

    let html = index(&[
        ("hw1/alice.3/src", 90, "old/bob", 90, 40),
        ("hw1/carol.2/.moss-scratch-Q1/include", 60, "hw1/dave", 55, 25),
    ])
    // no page name in the second match's link
    .replace(&format!("{BASE}match1.html"), BASE);
    let mut fetcher = FakeFetcher::new();
    fetcher.serve(INDEX_URL, html);
    fetcher.serve_match(0);

    let mut config = JobConfig::new("hw1");
    config.job_dir = Some(tmp.path().to_path_buf());
    let strategies = Strategies::default();
    let engine = RunEngine::new(&config, &strategies);
    let download = engine.download(&job, &fetcher, &SilentReporter).unwrap();

    assert_eq!(download.total_matches, 2);
    assert_eq!(download.retained_matches, 2);
    assert_eq!(download.archived_matches, 1);
    assert_eq!(download.pages, 4);

    let results = job.results_dir();
    assert!(results.join("hw1_alice.3__old_bob").join(PRIMARY_PAGE).is_file());

    let summary = fs::read_to_string(results.join(SUMMARY_FILE)).unwrap();
    assert!(!summary.contains(".moss-scratch-"));
    let rows: Vec<Vec<&str>> = summary
        .lines()
        .skip(1)
        .map(|l| l.split('\t').collect())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "hw1_alice.3");
    assert_eq!(rows[0][6], "hw1_alice.3__old_bob");
    assert_eq!(rows[1][0], "hw1_carol.2");
    assert_eq!(rows[1][6], "");
    assert!(!results.join("hw1_carol.2__hw1_dave").exists());
}

#[test]
fn test_download_without_url_record_fails() {
    let tmp = tempdir().unwrap();
    let job = Job::open(tmp.path()).unwrap();
    let config = JobConfig::new("hw1");
    let strategies = Strategies::default();
    let engine = RunEngine::new(&config, &strategies);

    let err = engine
        .download(&job, &FakeFetcher::new(), &SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    assert!(!job.results_dir().exists());
}
