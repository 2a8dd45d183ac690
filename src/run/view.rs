//! run::view
//!
//! `ghr run view`: summarize a workflow run or one of its jobs, print its
//! logs, or open it in the browser.
//!
//! # Logs
//!
//! `--log` and `--log-failed` need the run (or selected job) to have
//! finished. The run's log archive is fetched once and cached under the
//! run log cache directory; see [`super::logs`].

use std::io::Write;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::logs::{
    get_run_log, populate_log_segments, prefix_lines, read_segment, RunLogCache, ZipLogMap,
};
use crate::cli::CliError;
use crate::core::types::Repo;
use crate::forge::{Conclusion, Forge, Job, RunStatus, WorkflowRun};
use crate::ui::browser::Browser;
use crate::ui::output::IoStreams;

/// Input to [`run_view`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunViewOptions {
    pub run_id: Option<u64>,
    pub job_id: Option<u64>,
    pub attempt: Option<u64>,
    pub log: bool,
    pub log_failed: bool,
    pub web: bool,
    pub exit_status: bool,
    /// Show steps of every job, not only failed ones.
    pub verbose: bool,
}

impl RunViewOptions {
    pub fn validate(&self) -> Result<(), CliError> {
        if self.run_id.is_none() && self.job_id.is_none() {
            return Err(CliError::Flag(
                "run or job ID required when not running interactively".into(),
            ));
        }
        if self.web && (self.log || self.log_failed) {
            return Err(CliError::Flag("specify only one of --web or --log".into()));
        }
        if self.log && self.log_failed {
            return Err(CliError::Flag(
                "specify only one of --log or --log-failed".into(),
            ));
        }
        Ok(())
    }
}

/// Everything `run view` talks to.
pub struct RunViewEnv<'a> {
    pub io: &'a IoStreams,
    pub forge: &'a dyn Forge,
    pub browser: &'a dyn Browser,
    pub cache: &'a RunLogCache,
    pub repo: &'a Repo,
}

pub async fn run_view(env: &RunViewEnv<'_>, opts: &RunViewOptions) -> Result<()> {
    opts.validate()?;
    let RunViewEnv {
        io,
        forge,
        browser,
        cache,
        repo,
    } = *env;

    let mut selected_job = None;
    let run_id = match opts.job_id {
        Some(job_id) => {
            let job = forge
                .job(repo, job_id)
                .await
                .map_err(|e| anyhow!("failed to get job: {e}"))?;
            let run_id = job.run_id;
            selected_job = Some(job);
            run_id
        }
        None => opts
            .run_id
            .ok_or_else(|| CliError::Flag("run or job ID required".into()))?,
    };

    let run = forge
        .workflow_run(repo, run_id, opts.attempt)
        .await
        .map_err(|e| anyhow!("failed to get run: {e}"))?;
    debug!(run = run.id, status = ?run.status, "fetched run");

    if opts.web {
        let url = match &selected_job {
            Some(job) => format!("{}?check_suite_focus=true", job.html_url),
            None => run.html_url.clone(),
        };
        if io.is_stdout_tty() {
            writeln!(io.out(), "Opening {} in your browser.", display_url(&url))?;
        }
        return browser
            .browse(&url)
            .map_err(|e| anyhow!("failed to open {url}: {e}"));
    }

    let jobs = match &selected_job {
        Some(job) => vec![job.clone()],
        None => forge
            .run_jobs(repo, run.id, opts.attempt)
            .await
            .map_err(|e| anyhow!("failed to get jobs: {e}"))?,
    };

    if opts.log || opts.log_failed {
        match &selected_job {
            Some(job) if job.status != RunStatus::Completed => bail!(
                "job {} is still in progress; logs will be available when it is complete",
                job.id
            ),
            None if run.status != RunStatus::Completed => bail!(
                "run {} is still in progress; logs will be available when it is complete",
                run.id
            ),
            _ => {}
        }

        let mut archive = get_run_log(cache, forge, repo, &run, opts.attempt)
            .await
            .map_err(|e| anyhow!("failed to get run log: {e}"))?;
        let map = ZipLogMap::from_archive(&archive, &jobs)?;
        let segments = populate_log_segments(&map, &jobs, opts.log_failed)?;
        for segment in &segments {
            let log = read_segment(segment, &mut archive, forge, repo).await?;
            io.out().write_all(prefix_lines(segment, &log).as_bytes())?;
        }
        return Ok(());
    }

    render_summary(io, &run, &jobs, selected_job.as_ref(), opts.verbose, Utc::now())?;

    let failed = match &selected_job {
        Some(job) => is_failure(job.conclusion),
        None => is_failure(run.conclusion),
    };
    if opts.exit_status && failed {
        return Err(CliError::Silent.into());
    }
    Ok(())
}

fn is_failure(conclusion: Option<Conclusion>) -> bool {
    conclusion.is_some_and(|c| c.is_failure())
}

fn display_url(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

fn symbol(io: &IoStreams, status: RunStatus, conclusion: Option<Conclusion>) -> String {
    if status != RunStatus::Completed {
        return io.muted("*");
    }
    match conclusion {
        Some(Conclusion::Success) => io.success_style("✓"),
        Some(c) if c.is_failure() => io.failure_style("X"),
        _ => io.muted("-"),
    }
}

/// `1h2m3s` style elapsed time.
pub fn format_elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let secs = (end - start).num_seconds().max(0);
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

/// Rough age of `then`, e.g. `about 3 hours ago`.
pub fn fuzzy_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let ago = now - then;
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("about 1 {unit} ago")
        } else {
            format!("about {n} {unit}s ago")
        }
    };
    if ago.num_minutes() < 1 {
        "less than a minute ago".to_string()
    } else if ago.num_hours() < 1 {
        plural(ago.num_minutes(), "minute")
    } else if ago.num_days() < 1 {
        plural(ago.num_hours(), "hour")
    } else if ago.num_days() < 30 {
        plural(ago.num_days(), "day")
    } else {
        then.format("%b %-d, %Y").to_string()
    }
}

fn render_summary(
    io: &IoStreams,
    run: &WorkflowRun,
    jobs: &[Job],
    selected_job: Option<&Job>,
    verbose: bool,
    now: DateTime<Utc>,
) -> std::io::Result<()> {
    let mut out = io.out();

    let attempt = if run.run_attempt > 1 {
        format!(" (Attempt #{})", run.run_attempt)
    } else {
        String::new()
    };
    writeln!(out)?;
    writeln!(
        out,
        "{} {} {} · {}{}",
        symbol(io, run.status, run.conclusion),
        io.bold(&run.head_branch),
        run.name,
        run.id,
        attempt
    )?;
    writeln!(
        out,
        "Triggered via {} {}",
        run.event,
        fuzzy_ago(now, run.created_at)
    )?;
    writeln!(out)?;

    let startup_failure = run.conclusion == Some(Conclusion::StartupFailure);
    if startup_failure || (jobs.is_empty() && is_failure(run.conclusion)) {
        writeln!(
            out,
            "{}",
            io.failure_style("This run likely failed because of a workflow file issue.")
        )?;
        writeln!(out)?;
        writeln!(out, "For more information, see: {}", io.bold(&run.html_url))?;
        return Ok(());
    }

    writeln!(out, "{}", io.bold("JOBS"))?;
    for job in jobs {
        let elapsed = match (job.started_at, job.completed_at) {
            (Some(start), Some(end)) => format!(" in {}", format_elapsed(start, end)),
            _ => String::new(),
        };
        writeln!(
            out,
            "{} {}{} (ID {})",
            symbol(io, job.status, job.conclusion),
            io.bold(&job.name),
            elapsed,
            job.id
        )?;
        if verbose || selected_job.is_some() || is_failure(job.conclusion) {
            for step in &job.steps {
                writeln!(
                    out,
                    "  {} {}",
                    symbol(io, step.status, step.conclusion),
                    step.name
                )?;
            }
        }
    }
    writeln!(out)?;

    match selected_job {
        None if is_failure(run.conclusion) => writeln!(
            out,
            "To see what failed, try: ghr run view {} --log-failed",
            run.id
        )?,
        None if jobs.len() == 1 => writeln!(
            out,
            "For more information about the job, try: ghr run view --job={}",
            jobs[0].id
        )?,
        None => writeln!(
            out,
            "For more information about a job, try: ghr run view --job=<job-id>"
        )?,
        Some(job) if is_failure(job.conclusion) => writeln!(
            out,
            "To see the logs for the failed steps, try: ghr run view --log-failed --job={}",
            job.id
        )?,
        Some(job) if job.status == RunStatus::Completed => writeln!(
            out,
            "To see the full job log, try: ghr run view --log --job={}",
            job.id
        )?,
        Some(_) => {}
    }
    writeln!(
        out,
        "{}",
        io.muted(&format!("View this run on GitHub: {}", run.html_url))
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge, MockOperation};
    use crate::forge::ForgeError;
    use crate::run::logs::test_support::{archive, job, step};
    use crate::ui::browser::StubBrowser;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn run(conclusion: Conclusion) -> WorkflowRun {
        WorkflowRun {
            id: 1,
            name: "CI".into(),
            display_title: "Fix the frobnicator".into(),
            status: RunStatus::Completed,
            conclusion: Some(conclusion),
            head_branch: "fix".into(),
            head_sha: "abc123".into(),
            event: "push".into(),
            run_attempt: 1,
            run_started_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            html_url: "https://github.com/octo/hello/actions/runs/1".into(),
        }
    }

    fn jobs() -> Vec<Job> {
        vec![
            job(
                10,
                "build",
                Conclusion::Success,
                vec![step(1, "checkout", Conclusion::Success)],
            ),
            job(
                11,
                "test",
                Conclusion::Failure,
                vec![
                    step(1, "checkout", Conclusion::Success),
                    step(2, "cargo test", Conclusion::Failure),
                ],
            ),
        ]
    }

    fn forge(conclusion: Conclusion) -> MockForge {
        MockForge::new()
            .with_run(run(conclusion))
            .with_jobs(1, jobs())
            .with_run_log_archive(
                1,
                archive(&[
                    ("0_build.txt", "built\n"),
                    ("build/1_checkout.txt", "checked out\n"),
                    ("1_test.txt", "whole test log\n"),
                    ("test/1_checkout.txt", "checked out\n"),
                    ("test/2_cargo test.txt", "test failed\npanicked\n"),
                ]),
            )
    }

    struct Harness {
        io: IoStreams,
        output: crate::ui::output::TestOutput,
        browser: StubBrowser,
        cache_dir: TempDir,
        repo: Repo,
    }

    impl Harness {
        fn new() -> Self {
            let (io, output) = IoStreams::test();
            Self {
                io,
                output,
                browser: StubBrowser::new(),
                cache_dir: tempfile::tempdir().unwrap(),
                repo: Repo::new("octo", "hello"),
            }
        }

        async fn view(&self, forge: &MockForge, opts: RunViewOptions) -> Result<()> {
            let cache = RunLogCache::new(self.cache_dir.path());
            let env = RunViewEnv {
                io: &self.io,
                forge,
                browser: &self.browser,
                cache: &cache,
                repo: &self.repo,
            };
            run_view(&env, &opts).await
        }
    }

    fn for_run() -> RunViewOptions {
        RunViewOptions {
            run_id: Some(1),
            ..Default::default()
        }
    }

    mod flags {
        use super::*;

        #[test]
        fn conflicting_flags() {
            let web_log = RunViewOptions {
                web: true,
                log: true,
                ..for_run()
            };
            assert_eq!(
                web_log.validate().unwrap_err().to_string(),
                "specify only one of --web or --log"
            );

            let both_logs = RunViewOptions {
                log: true,
                log_failed: true,
                ..for_run()
            };
            assert_eq!(
                both_logs.validate().unwrap_err().to_string(),
                "specify only one of --log or --log-failed"
            );
        }

        #[test]
        fn needs_an_id() {
            assert!(RunViewOptions::default().validate().is_err());
            assert!(RunViewOptions {
                job_id: Some(3),
                ..Default::default()
            }
            .validate()
            .is_ok());
        }
    }

    mod summary {
        use super::*;

        #[tokio::test]
        async fn failed_run() {
            let h = Harness::new();
            h.view(&forge(Conclusion::Failure), for_run()).await.unwrap();

            let out = h.output.stdout();
            assert!(out.contains("X fix CI · 1"));
            assert!(out.contains("Triggered via push"));
            assert!(out.contains("✓ build (ID 10)"));
            assert!(out.contains("X test (ID 11)"));
            assert!(out.contains("  X cargo test"));
            assert!(out.contains("✓ build (ID 10)\nX test (ID 11)\n"));
            assert!(out.contains("To see what failed, try: ghr run view 1 --log-failed"));
            assert!(out.ends_with("View this run on GitHub: https://github.com/octo/hello/actions/runs/1\n"));
        }

        #[tokio::test]
        async fn exit_status_on_failure() {
            let h = Harness::new();
            let opts = RunViewOptions {
                exit_status: true,
                ..for_run()
            };
            let err = h.view(&forge(Conclusion::Failure), opts.clone()).await.unwrap_err();
            assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Silent)));

            h.view(&forge(Conclusion::Success), opts).await.unwrap();
        }

        #[tokio::test]
        async fn workflow_file_issue() {
            let h = Harness::new();
            let forge = MockForge::new().with_run(run(Conclusion::StartupFailure));
            h.view(&forge, for_run()).await.unwrap();

            let out = h.output.stdout();
            assert!(out.contains("This run likely failed because of a workflow file issue."));
            assert!(!out.contains("JOBS"));
        }

        #[tokio::test]
        async fn selected_job() {
            let h = Harness::new();
            let opts = RunViewOptions {
                job_id: Some(10),
                ..Default::default()
            };
            let forge = forge(Conclusion::Failure);
            h.view(&forge, opts).await.unwrap();

            let out = h.output.stdout();
            assert!(out.contains("✓ build (ID 10)"));
            assert!(!out.contains("(ID 11)"));
            assert!(out.contains("To see the full job log, try: ghr run view --log --job=10"));
            assert!(!forge
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::RunJobs { .. })));
        }

        #[tokio::test]
        async fn run_fetch_failure() {
            let h = Harness::new();
            let forge = forge(Conclusion::Success)
                .fail_on(FailOn::WorkflowRun(ForgeError::RateLimited));
            let err = h.view(&forge, for_run()).await.unwrap_err();
            assert_eq!(err.to_string(), "failed to get run: rate limited");
        }
    }

    mod logs {
        use super::*;

        #[tokio::test]
        async fn full_log_uses_steps() {
            let h = Harness::new();
            let opts = RunViewOptions {
                log: true,
                ..for_run()
            };
            h.view(&forge(Conclusion::Failure), opts).await.unwrap();

            assert_eq!(
                h.output.stdout(),
                "build\tcheckout\tchecked out\n\
                 test\tcheckout\tchecked out\n\
                 test\tcargo test\ttest failed\n\
                 test\tcargo test\tpanicked\n"
            );
        }

        #[tokio::test]
        async fn failed_steps_only() {
            let h = Harness::new();
            let opts = RunViewOptions {
                log_failed: true,
                ..for_run()
            };
            h.view(&forge(Conclusion::Failure), opts).await.unwrap();

            assert_eq!(
                h.output.stdout(),
                "test\tcargo test\ttest failed\ntest\tcargo test\tpanicked\n"
            );
        }

        #[tokio::test]
        async fn api_fallback_for_missing_entries() {
            let h = Harness::new();
            let forge = MockForge::new()
                .with_run(run(Conclusion::Success))
                .with_jobs(1, vec![job(10, "build", Conclusion::Success, vec![])])
                .with_run_log_archive(1, archive(&[("unrelated.txt", "")]))
                .with_job_log(10, "from api\n");
            let opts = RunViewOptions {
                log: true,
                ..for_run()
            };
            h.view(&forge, opts).await.unwrap();

            assert_eq!(h.output.stdout(), "build\tUNKNOWN STEP\tfrom api\n");
        }

        #[tokio::test]
        async fn cached_after_first_view() {
            let h = Harness::new();
            let forge = forge(Conclusion::Failure);
            let opts = RunViewOptions {
                log: true,
                ..for_run()
            };
            h.view(&forge, opts.clone()).await.unwrap();
            h.view(&forge, opts).await.unwrap();

            let downloads = forge
                .operations()
                .iter()
                .filter(|op| matches!(op, MockOperation::RunLogArchive { .. }))
                .count();
            assert_eq!(downloads, 1);
        }

        #[tokio::test]
        async fn in_progress_run() {
            let h = Harness::new();
            let mut pending = run(Conclusion::Success);
            pending.status = RunStatus::InProgress;
            pending.conclusion = None;
            let forge = MockForge::new().with_run(pending);
            let opts = RunViewOptions {
                log: true,
                ..for_run()
            };
            let err = h.view(&forge, opts).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "run 1 is still in progress; logs will be available when it is complete"
            );
        }

        #[tokio::test]
        async fn missing_archive() {
            let h = Harness::new();
            let forge = MockForge::new()
                .with_run(run(Conclusion::Success))
                .with_jobs(1, jobs());
            let opts = RunViewOptions {
                log: true,
                ..for_run()
            };
            let err = h.view(&forge, opts).await.unwrap_err();
            assert!(err.to_string().starts_with("failed to get run log: "));
        }
    }

    mod web {
        use super::*;

        #[tokio::test]
        async fn opens_run() {
            let h = Harness::new();
            let opts = RunViewOptions {
                web: true,
                ..for_run()
            };
            h.view(&forge(Conclusion::Success), opts).await.unwrap();
            assert_eq!(
                h.browser.urls(),
                vec!["https://github.com/octo/hello/actions/runs/1"]
            );
            assert_eq!(h.output.stdout(), "");
        }

        #[tokio::test]
        async fn opens_job_with_focus() {
            let (io, output) = IoStreams::test();
            let mut h = Harness::new();
            h.io = io.with_tty(true);
            h.output = output;
            let opts = RunViewOptions {
                web: true,
                job_id: Some(11),
                ..Default::default()
            };
            h.view(&forge(Conclusion::Success), opts).await.unwrap();

            let url = "https://github.com/octo/hello/actions/runs/1/job/11?check_suite_focus=true";
            assert_eq!(h.browser.urls(), vec![url]);
            assert_eq!(
                h.output.stdout(),
                format!("Opening {} in your browser.\n", &url["https://".len()..])
            );
        }
    }

    #[test]
    fn elapsed_and_age() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_elapsed(start, start + chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_elapsed(start, start + chrono::Duration::seconds(62)), "1m2s");
        assert_eq!(
            format_elapsed(start, start + chrono::Duration::seconds(3723)),
            "1h2m3s"
        );

        assert_eq!(fuzzy_ago(start + chrono::Duration::seconds(30), start), "less than a minute ago");
        assert_eq!(fuzzy_ago(start + chrono::Duration::hours(3), start), "about 3 hours ago");
        assert_eq!(fuzzy_ago(start + chrono::Duration::days(1), start), "about 1 day ago");
    }
}
