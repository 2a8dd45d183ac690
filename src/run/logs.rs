//! run::logs
//!
//! Workflow run logs: the on-disk archive cache and the mapping from jobs
//! and steps to files inside an archive.
//!
//! # Archive layout
//!
//! A run log archive holds one top-level `<ordinal>_<job>.txt` per job (or
//! `-<id>_<job>.txt` from the legacy service) and a `<job>/` directory with
//! one `<step number>_<step>.txt` per step. Job names in file names are
//! sanitized by the server: `/` and `:` are dropped and the name is cut to
//! 90 UTF-16 code units, then trimmed.
//!
//! # Cache
//!
//! Archives are keyed by run ID and start time, so a re-run (new start
//! time) never reuses a stale archive. Writers hold an exclusive `fs2`
//! lock on the entry while filling it; readers take a shared lock before
//! opening. Nothing is ever evicted.
//!
//! # Example
//!
//! ```
//! use ghr::run::logs::sanitize_job_name;
//!
//! assert_eq!(sanitize_job_name("build / test: unit"), "build  test unit");
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek};
use std::path::PathBuf;

use fs2::FileExt;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use crate::core::types::Repo;
use crate::forge::{Conclusion, Forge, ForgeError, Job, Step, WorkflowRun};

/// Longest job name, in UTF-16 code units, that appears in archive paths.
pub const JOB_NAME_MAX_LENGTH: usize = 90;

/// Most jobs whose logs may be fetched one by one from the API.
pub const MAX_API_LOG_FETCHERS: usize = 25;

/// Step name printed for whole-job logs.
pub const UNKNOWN_STEP: &str = "UNKNOWN STEP";

/// Errors from fetching, caching or reading run logs.
#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid log archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid log file pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(
        "too many API requests needed to fetch logs; try narrowing down to a specific job with the `--job` option"
    )]
    TooManyApiFetchers,

    #[error("log not found: {0}")]
    JobLogNotFound(u64),

    #[error(transparent)]
    Forge(#[from] ForgeError),
}

fn io_error(context: impl Into<String>) -> impl FnOnce(io::Error) -> RunLogError {
    let context = context.into();
    move |source| RunLogError::Io { context, source }
}

/// Cached run log archives in a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogCache {
    dir: PathBuf,
}

impl RunLogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<run id>-<unix start time>`.
    pub fn key(run: &WorkflowRun) -> String {
        format!("{}-{}", run.id, run.started_time().timestamp())
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("run-log-{key}.zip"))
    }

    pub fn exists(&self, key: &str) -> Result<bool, RunLogError> {
        match fs::metadata(self.path(key)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RunLogError::Io {
                context: "checking cache entry".into(),
                source,
            }),
        }
    }

    /// Write `content` as the entry for `key`, replacing any existing entry.
    pub fn create(&self, key: &str, content: &mut dyn Read) -> Result<(), RunLogError> {
        fs::create_dir_all(&self.dir).map_err(io_error("creating cache directory"))?;

        let path = self.path(key);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error("creating cache entry"))?;
        file.lock_exclusive()
            .map_err(io_error("locking cache entry"))?;
        file.set_len(0).map_err(io_error("writing cache entry"))?;
        io::copy(content, &mut file).map_err(io_error("writing cache entry"))?;
        debug!(path = %path.display(), "cached run log");
        Ok(())
    }

    pub fn open(&self, key: &str) -> Result<ZipArchive<File>, RunLogError> {
        let file = File::open(self.path(key)).map_err(io_error("opening cache entry"))?;
        FileExt::lock_shared(&file).map_err(io_error("locking cache entry"))?;
        Ok(ZipArchive::new(file)?)
    }
}

/// The log archive of `run`, downloaded on first use.
pub async fn get_run_log(
    cache: &RunLogCache,
    forge: &dyn Forge,
    repo: &Repo,
    run: &WorkflowRun,
    attempt: Option<u64>,
) -> Result<ZipArchive<File>, RunLogError> {
    let key = RunLogCache::key(run);
    if cache.exists(&key)? {
        debug!(%key, "run log cache hit");
    } else {
        debug!(%key, "run log cache miss");
        let data = forge.run_log_archive(repo, run.id, attempt).await?;
        ZipArchive::new(Cursor::new(data.as_slice()))?;
        cache.create(&key, &mut data.as_slice())?;
    }
    cache.open(&key)
}

/// Cut `s` to `max` UTF-16 code units and trim it.
///
/// A surrogate pair split by the cut becomes U+FFFD.
pub fn truncate_as_utf16(s: &str, max: usize) -> String {
    let units: Vec<u16> = s.encode_utf16().collect();
    if units.len() > max {
        String::from_utf16_lossy(&units[..max]).trim().to_string()
    } else {
        s.trim().to_string()
    }
}

/// Job name as it appears in archive file names.
pub fn sanitize_job_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| *c != '/' && *c != ':').collect();
    truncate_as_utf16(&stripped, JOB_NAME_MAX_LENGTH)
}

/// Top-level whole-job log, e.g. `0_build.txt`.
pub fn job_log_filename_regexp(job: &Job) -> Result<Regex, regex::Error> {
    let name = regex::escape(&sanitize_job_name(&job.name));
    Regex::new(&format!(r"^\d+_{name}\.txt$"))
}

/// Top-level whole-job log from the legacy service, e.g. `-2147483648_build.txt`.
pub fn legacy_job_log_filename_regexp(job: &Job) -> Result<Regex, regex::Error> {
    let name = regex::escape(&sanitize_job_name(&job.name));
    Regex::new(&format!(r"^-\d+_{name}\.txt$"))
}

/// Step log inside the job directory, e.g. `build/2_Run tests.txt`.
pub fn step_log_filename_regexp(job: &Job, step: &Step) -> Result<Regex, regex::Error> {
    let name = regex::escape(&sanitize_job_name(&job.name));
    Regex::new(&format!(r"^{name}/{}_.*\.txt$", step.number))
}

/// Which archive entries hold which job and step logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipLogMap {
    jobs: HashMap<u64, String>,
    steps: HashMap<(u64, u64), String>,
}

impl ZipLogMap {
    /// Match the entries named `file_names` against `jobs`.
    ///
    /// A normal job log wins over a legacy one.
    pub fn new<'a>(
        file_names: impl IntoIterator<Item = &'a str>,
        jobs: &[Job],
    ) -> Result<Self, regex::Error> {
        let names: Vec<&str> = file_names.into_iter().collect();
        let find = |re: &Regex| names.iter().find(|n| re.is_match(n)).map(|n| n.to_string());

        let mut map = Self::default();
        for job in jobs {
            let job_log = find(&job_log_filename_regexp(job)?)
                .or(find(&legacy_job_log_filename_regexp(job)?));
            if let Some(name) = job_log {
                map.jobs.insert(job.id, name);
            }
            for step in &job.steps {
                if let Some(name) = find(&step_log_filename_regexp(job, step)?) {
                    map.steps.insert((job.id, step.number), name);
                }
            }
        }
        Ok(map)
    }

    /// Build the map from an open archive.
    pub fn from_archive<R: Read + Seek>(
        archive: &ZipArchive<R>,
        jobs: &[Job],
    ) -> Result<Self, regex::Error> {
        Self::new(archive.file_names(), jobs)
    }

    pub fn for_job(&self, job_id: u64) -> Option<&str> {
        self.jobs.get(&job_id).map(String::as_str)
    }

    pub fn for_step(&self, job_id: u64, step_number: u64) -> Option<&str> {
        self.steps.get(&(job_id, step_number)).map(String::as_str)
    }
}

/// Where the text of a log segment comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// An entry of the run log archive.
    Archive(String),
    /// The per-job log endpoint.
    Api { job_id: u64 },
}

/// A whole-job or single-step piece of log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogSegment {
    pub job: Job,
    /// `None` for a whole-job log.
    pub step: Option<Step>,
    pub source: LogSource,
}

fn is_failure(conclusion: Option<Conclusion>) -> bool {
    conclusion.is_some_and(|c| c.is_failure())
}

/// Decide which log to print for each job.
///
/// Skipped jobs are left out. A job with any step log in the archive is
/// shown step by step (steps without a log are dropped); otherwise its
/// whole-job log is used, from the archive or else from the API.
pub fn populate_log_segments(
    map: &ZipLogMap,
    jobs: &[Job],
    only_failed: bool,
) -> Result<Vec<JobLogSegment>, RunLogError> {
    let mut segments = Vec::new();
    let mut api_fetchers = 0;

    for job in jobs {
        if job.conclusion == Some(Conclusion::Skipped) {
            continue;
        }
        if only_failed && !is_failure(job.conclusion) {
            continue;
        }

        let has_step_log = job
            .steps
            .iter()
            .any(|step| map.for_step(job.id, step.number).is_some());

        if has_step_log {
            let mut steps = job.steps.clone();
            steps.sort_by_key(|s| s.number);
            for step in steps {
                if only_failed && !is_failure(step.conclusion) {
                    continue;
                }
                let Some(name) = map.for_step(job.id, step.number) else {
                    continue;
                };
                segments.push(JobLogSegment {
                    job: job.clone(),
                    source: LogSource::Archive(name.to_string()),
                    step: Some(step),
                });
            }
            continue;
        }

        let source = match map.for_job(job.id) {
            Some(name) => LogSource::Archive(name.to_string()),
            None => {
                api_fetchers += 1;
                LogSource::Api { job_id: job.id }
            }
        };
        segments.push(JobLogSegment {
            job: job.clone(),
            step: None,
            source,
        });

        if api_fetchers > MAX_API_LOG_FETCHERS {
            return Err(RunLogError::TooManyApiFetchers);
        }
    }

    Ok(segments)
}

/// Read the text of `segment`.
pub async fn read_segment<R: Read + Seek>(
    segment: &JobLogSegment,
    archive: &mut ZipArchive<R>,
    forge: &dyn Forge,
    repo: &Repo,
) -> Result<String, RunLogError> {
    match &segment.source {
        LogSource::Archive(name) => {
            let mut entry = archive.by_name(name)?;
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(io_error(format!("reading {name}")))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        LogSource::Api { job_id } => match forge.job_log(repo, *job_id).await {
            Ok(log) => Ok(log),
            Err(ForgeError::NotFound(_)) => Err(RunLogError::JobLogNotFound(*job_id)),
            Err(e) => Err(e.into()),
        },
    }
}

/// Prefix every line of `log` with `<job>\t<step>\t`.
pub fn prefix_lines(segment: &JobLogSegment, log: &str) -> String {
    let step = segment.step.as_ref().map_or(UNKNOWN_STEP, |s| s.name.as_str());
    let prefix = format!("{}\t{}\t", segment.job.name, step);
    log.lines().map(|line| format!("{prefix}{line}\n")).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::{archive, job, step};
    use super::*;
    use crate::forge::mock::{MockForge, MockOperation};
    use crate::forge::RunStatus;
    use chrono::{TimeZone, Utc};

    fn run() -> WorkflowRun {
        WorkflowRun {
            id: 42,
            name: "CI".into(),
            display_title: "Fix it".into(),
            status: RunStatus::Completed,
            conclusion: Some(Conclusion::Failure),
            head_branch: "main".into(),
            head_sha: "abc".into(),
            event: "push".into(),
            run_attempt: 1,
            run_started_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap(),
            html_url: "https://github.com/octo/hello/actions/runs/42".into(),
        }
    }

    mod names {
        use super::*;

        #[test]
        fn sanitize_strips_separators() {
            assert_eq!(sanitize_job_name("build / lint"), "build  lint");
            assert_eq!(sanitize_job_name("deploy: prod"), "deploy prod");
        }

        #[test]
        fn truncates_in_utf16_units() {
            assert_eq!(truncate_as_utf16("a😅😅", 5), "a😅😅");
            assert_eq!(truncate_as_utf16("a😅😅", 4), "a😅\u{FFFD}");
            assert_eq!(truncate_as_utf16("  padded  ", 90), "padded");
        }

        #[test]
        fn long_names_cut_to_ninety_then_trimmed() {
            let name = format!("{} tail", "x".repeat(89));
            assert_eq!(sanitize_job_name(&name), "x".repeat(89));
        }

        #[test]
        fn job_patterns() {
            let j = job(1, "cool job", Conclusion::Success, vec![]);
            assert!(job_log_filename_regexp(&j).unwrap().is_match("0_cool job.txt"));
            assert!(!job_log_filename_regexp(&j).unwrap().is_match("-1_cool job.txt"));
            assert!(legacy_job_log_filename_regexp(&j)
                .unwrap()
                .is_match("-9999999999_cool job.txt"));

            let s = step(2, "Run tests", Conclusion::Success);
            let re = step_log_filename_regexp(&j, &s).unwrap();
            assert!(re.is_match("cool job/2_Run tests.txt"));
            assert!(!re.is_match("cool job/12_Run tests.txt"));
        }

        #[test]
        fn regex_metacharacters_are_literal() {
            let j = job(1, "test (3.11)", Conclusion::Success, vec![]);
            let re = job_log_filename_regexp(&j).unwrap();
            assert!(re.is_match("3_test (3.11).txt"));
            assert!(!re.is_match("3_test 3x11.txt"));
        }
    }

    mod segments {
        use super::*;

        fn jobs() -> Vec<Job> {
            vec![
                job(
                    1,
                    "build",
                    Conclusion::Failure,
                    vec![
                        step(2, "compile", Conclusion::Failure),
                        step(1, "checkout", Conclusion::Success),
                        step(3, "upload", Conclusion::Success),
                    ],
                ),
                job(2, "lint", Conclusion::Success, vec![step(1, "clippy", Conclusion::Success)]),
                job(3, "docs", Conclusion::Skipped, vec![]),
                job(4, "legacy", Conclusion::Success, vec![]),
                job(5, "missing", Conclusion::Failure, vec![]),
            ]
        }

        fn map() -> ZipLogMap {
            ZipLogMap::new(
                [
                    "0_build.txt",
                    "build/1_checkout.txt",
                    "build/2_compile.txt",
                    "1_lint.txt",
                    "-123_legacy.txt",
                ],
                &jobs(),
            )
            .unwrap()
        }

        #[test]
        fn map_matches_jobs_and_steps() {
            let map = map();
            assert_eq!(map.for_job(1), Some("0_build.txt"));
            assert_eq!(map.for_job(4), Some("-123_legacy.txt"));
            assert_eq!(map.for_step(1, 2), Some("build/2_compile.txt"));
            assert_eq!(map.for_step(1, 3), None);
            assert_eq!(map.for_job(5), None);
        }

        #[test]
        fn steps_in_order_and_fallbacks() {
            let segments = populate_log_segments(&map(), &jobs(), false).unwrap();
            let summary: Vec<(String, Option<String>, LogSource)> = segments
                .into_iter()
                .map(|s| (s.job.name, s.step.map(|st| st.name), s.source))
                .collect();

            assert_eq!(
                summary,
                vec![
                    (
                        "build".to_string(),
                        Some("checkout".to_string()),
                        LogSource::Archive("build/1_checkout.txt".into())
                    ),
                    (
                        "build".to_string(),
                        Some("compile".to_string()),
                        LogSource::Archive("build/2_compile.txt".into())
                    ),
                    ("lint".to_string(), None, LogSource::Archive("1_lint.txt".into())),
                    (
                        "legacy".to_string(),
                        None,
                        LogSource::Archive("-123_legacy.txt".into())
                    ),
                    ("missing".to_string(), None, LogSource::Api { job_id: 5 }),
                ]
            );
        }

        #[test]
        fn only_failed_filters_jobs_and_steps() {
            let segments = populate_log_segments(&map(), &jobs(), true).unwrap();
            let steps: Vec<Option<String>> = segments
                .iter()
                .map(|s| s.step.as_ref().map(|st| st.name.clone()))
                .collect();
            assert_eq!(steps, vec![Some("compile".to_string()), None]);
            assert_eq!(segments[1].source, LogSource::Api { job_id: 5 });
        }

        #[test]
        fn too_many_api_fetchers() {
            let many: Vec<Job> = (1..=26)
                .map(|id| job(id, &format!("job {id}"), Conclusion::Success, vec![]))
                .collect();
            let err = populate_log_segments(&ZipLogMap::default(), &many, false).unwrap_err();
            assert!(matches!(err, RunLogError::TooManyApiFetchers));

            let enough = &many[..25];
            assert_eq!(
                populate_log_segments(&ZipLogMap::default(), enough, false)
                    .unwrap()
                    .len(),
                25
            );
        }

        #[test]
        fn prefixes_each_line() {
            let segment = JobLogSegment {
                job: job(1, "build", Conclusion::Success, vec![]),
                step: None,
                source: LogSource::Api { job_id: 1 },
            };
            assert_eq!(
                prefix_lines(&segment, "one\r\ntwo\n"),
                "build\tUNKNOWN STEP\tone\nbuild\tUNKNOWN STEP\ttwo\n"
            );
        }
    }

    mod cache {
        use super::*;

        #[test]
        fn key_uses_start_time() {
            let key = RunLogCache::key(&run());
            assert_eq!(key, format!("42-{}", run().started_time().timestamp()));
            let cache = RunLogCache::new("/cache");
            assert_eq!(
                cache.path(&key),
                PathBuf::from(format!("/cache/run-log-{key}.zip"))
            );
        }

        #[test]
        fn create_then_open() {
            let dir = tempfile::tempdir().unwrap();
            let cache = RunLogCache::new(dir.path().join("nested"));
            let data = archive(&[("0_build.txt", "hello")]);

            assert!(!cache.exists("1-2").unwrap());
            cache.create("1-2", &mut data.as_slice()).unwrap();
            assert!(cache.exists("1-2").unwrap());

            let mut zip = cache.open("1-2").unwrap();
            let mut text = String::new();
            zip.by_name("0_build.txt")
                .unwrap()
                .read_to_string(&mut text)
                .unwrap();
            assert_eq!(text, "hello");
        }

        #[test]
        fn create_overwrites() {
            let dir = tempfile::tempdir().unwrap();
            let cache = RunLogCache::new(dir.path());
            let long = archive(&[("0_build.txt", &"x".repeat(4096))]);
            let short = archive(&[("0_lint.txt", "y")]);

            cache.create("k", &mut long.as_slice()).unwrap();
            cache.create("k", &mut short.as_slice()).unwrap();

            let zip = cache.open("k").unwrap();
            assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["0_lint.txt"]);
        }

        #[tokio::test]
        async fn downloads_once() {
            let dir = tempfile::tempdir().unwrap();
            let cache = RunLogCache::new(dir.path());
            let repo = Repo::new("octo", "hello");
            let forge =
                MockForge::new().with_run_log_archive(42, archive(&[("0_build.txt", "log")]));

            get_run_log(&cache, &forge, &repo, &run(), None).await.unwrap();
            get_run_log(&cache, &forge, &repo, &run(), None).await.unwrap();

            let downloads = forge
                .operations()
                .into_iter()
                .filter(|op| matches!(op, MockOperation::RunLogArchive { .. }))
                .count();
            assert_eq!(downloads, 1);
        }

        #[tokio::test]
        async fn invalid_archive_is_not_cached() {
            let dir = tempfile::tempdir().unwrap();
            let cache = RunLogCache::new(dir.path());
            let forge = MockForge::new().with_run_log_archive(42, b"not a zip".to_vec());

            let err = get_run_log(&cache, &forge, &Repo::new("octo", "hello"), &run(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, RunLogError::Archive(_)));
            assert!(!cache.exists(&RunLogCache::key(&run())).unwrap());
        }
    }
}
