//! pr::view
//!
//! `ghr pr view`: show a pull request found by number, URL or branch.
//!
//! Output is a tab-separated field list when stdout is not a terminal and a
//! short human summary when it is.

use std::io::Write;

use anyhow::{anyhow, Result};

use super::finder::{FindOptions, PrFinder};
use crate::forge::{PrState, PullRequest};
use crate::ui::browser::Browser;
use crate::ui::output::IoStreams;

/// Fields fetched for display.
pub const VIEW_FIELDS: &[&str] = &[
    "url",
    "number",
    "title",
    "state",
    "isDraft",
    "author",
    "body",
    "baseRefName",
    "headRefName",
    "headRepositoryOwner",
    "isCrossRepository",
    "labels",
    "assignees",
    "reviewRequests",
    "projectItems",
    "milestone",
];

/// Input to [`run_view`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Number, URL or branch; empty means the current branch.
    pub selector: String,
    pub web: bool,
    pub comments: bool,
}

/// Find the pull request and print or open it.
pub async fn run_view(
    io: &IoStreams,
    finder: &dyn PrFinder,
    browser: &dyn Browser,
    opts: ViewOptions,
) -> Result<()> {
    let mut fields = VIEW_FIELDS.to_vec();
    if opts.web {
        fields = vec!["url"];
    } else if opts.comments {
        fields.extend(["comments", "reviews"]);
    }

    let (pr, repo) = finder
        .find(FindOptions::new(opts.selector.clone(), &fields))
        .await?;

    if opts.web {
        if io.is_stdout_tty() {
            let display = pr.url.strip_prefix("https://").unwrap_or(&pr.url);
            writeln!(io.err(), "Opening {display} in your browser.")?;
        }
        return browser
            .browse(&pr.url)
            .map_err(|e| anyhow!("failed to open {}: {e}", pr.url));
    }

    if io.is_stdout_tty() {
        render_tty(io, &pr, &repo.full_name(), opts.comments)?;
    } else {
        render_raw(io, &pr, opts.comments)?;
    }
    Ok(())
}

fn state_label(pr: &PullRequest) -> String {
    if pr.state == PrState::Open && pr.is_draft {
        "DRAFT".to_string()
    } else {
        pr.state.to_string()
    }
}

fn label_names(pr: &PullRequest) -> String {
    pr.labels
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn assignee_logins(pr: &PullRequest) -> String {
    pr.assignees
        .iter()
        .map(|a| a.login.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn project_titles(pr: &PullRequest) -> String {
    pr.project_items
        .iter()
        .map(|i| i.project.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_raw(io: &IoStreams, pr: &PullRequest, comments: bool) -> std::io::Result<()> {
    let mut out = io.out();
    writeln!(out, "title:\t{}", pr.title)?;
    writeln!(out, "state:\t{}", state_label(pr))?;
    writeln!(out, "author:\t{}", pr.author)?;
    writeln!(out, "labels:\t{}", label_names(pr))?;
    writeln!(out, "assignees:\t{}", assignee_logins(pr))?;
    writeln!(out, "reviewers:\t{}", pr.review_requests.join(", "))?;
    writeln!(out, "projects:\t{}", project_titles(pr))?;
    writeln!(
        out,
        "milestone:\t{}",
        pr.milestone.as_ref().map_or("", |m| m.title.as_str())
    )?;
    writeln!(out, "number:\t{}", pr.number)?;
    writeln!(out, "url:\t{}", pr.url)?;
    writeln!(out, "--")?;
    writeln!(out, "{}", pr.body)?;

    if comments {
        for comment in &pr.comments.nodes {
            writeln!(out, "--")?;
            writeln!(out, "author:\t{}", comment.author.login)?;
            writeln!(out, "{}", comment.body)?;
        }
    }
    Ok(())
}

fn render_tty(
    io: &IoStreams,
    pr: &PullRequest,
    repo_name: &str,
    comments: bool,
) -> std::io::Result<()> {
    let state = match state_label(pr).as_str() {
        "OPEN" => io.success_style("Open"),
        "DRAFT" => io.muted("Draft"),
        "MERGED" => io.bold("Merged"),
        _ => io.failure_style("Closed"),
    };

    let mut lines = vec![
        format!("{} {}#{}", io.bold(&pr.title), repo_name, pr.number),
        format!(
            "{} • {} wants to merge into {} from {}",
            state,
            pr.author,
            pr.base_ref_name,
            pr.head_label()
        ),
    ];
    for (name, value) in [
        ("Reviewers", pr.review_requests.join(", ")),
        ("Assignees", assignee_logins(pr)),
        ("Labels", label_names(pr)),
        ("Projects", project_titles(pr)),
        (
            "Milestone",
            pr.milestone.as_ref().map(|m| m.title.clone()).unwrap_or_default(),
        ),
    ] {
        if !value.is_empty() {
            lines.push(format!("{}: {}", io.bold(name), value));
        }
    }

    let mut out = io.out();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    if pr.body.trim().is_empty() {
        writeln!(out, "{}", io.muted("No description provided"))?;
    } else {
        writeln!(out, "{}", pr.body.trim_end())?;
    }

    if comments {
        for comment in &pr.comments.nodes {
            writeln!(out)?;
            writeln!(out, "{} commented", io.bold(&comment.author.login))?;
            writeln!(out, "{}", comment.body.trim_end())?;
        }
        for review in pr.reviews.nodes.iter().filter(|r| !r.body.is_empty()) {
            writeln!(out)?;
            writeln!(
                out,
                "{} reviewed ({})",
                io.bold(&review.author.login),
                review.state.to_lowercase().replace('_', " ")
            )?;
            writeln!(out, "{}", review.body.trim_end())?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", io.muted(&format!("View this pull request on GitHub: {}", pr.url)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Repo;
    use crate::forge::{Actor, Comment, Connection, Label, Milestone};
    use crate::pr::finder::StubFinder;
    use crate::ui::browser::StubBrowser;

    fn pr() -> PullRequest {
        PullRequest {
            number: 12,
            url: "https://github.com/octo/hello/pull/12".into(),
            title: "Fix the frobnicator".into(),
            body: "It was broken.".into(),
            author: "monalisa".into(),
            base_ref_name: "main".into(),
            head_ref_name: "fix".into(),
            labels: vec![Label {
                id: "L_1".into(),
                name: "bug".into(),
            }],
            assignees: vec![Actor {
                login: "hubot".into(),
                ..Default::default()
            }],
            review_requests: vec!["octocat".into(), "octo/core".into()],
            milestone: Some(Milestone {
                title: "v1".into(),
                ..Default::default()
            }),
            comments: Connection::complete(vec![Comment {
                author: Actor {
                    login: "octocat".into(),
                    ..Default::default()
                },
                body: "LGTM".into(),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    fn finder() -> StubFinder {
        StubFinder::new("12", pr(), Repo::new("octo", "hello"))
    }

    fn opts() -> ViewOptions {
        ViewOptions {
            selector: "12".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn raw_output() {
        let (io, output) = IoStreams::test();
        run_view(&io, &finder(), &StubBrowser::new(), opts())
            .await
            .unwrap();

        assert_eq!(
            output.stdout(),
            "title:\tFix the frobnicator\n\
             state:\tOPEN\n\
             author:\tmonalisa\n\
             labels:\tbug\n\
             assignees:\thubot\n\
             reviewers:\toctocat, octo/core\n\
             projects:\t\n\
             milestone:\tv1\n\
             number:\t12\n\
             url:\thttps://github.com/octo/hello/pull/12\n\
             --\n\
             It was broken.\n"
        );
    }

    #[tokio::test]
    async fn comments_are_requested_and_printed() {
        let (io, output) = IoStreams::test();
        let finder = finder();
        let opts = ViewOptions {
            comments: true,
            ..opts()
        };
        run_view(&io, &finder, &StubBrowser::new(), opts).await.unwrap();

        assert!(finder.calls()[0].fields.contains(&"comments".to_string()));
        assert!(output.stdout().ends_with("--\nauthor:\toctocat\nLGTM\n"));
    }

    #[tokio::test]
    async fn tty_summary() {
        let (io, output) = IoStreams::test();
        let io = io.with_tty(true);
        run_view(&io, &finder(), &StubBrowser::new(), opts())
            .await
            .unwrap();

        let stdout = output.stdout();
        assert!(stdout.contains("octo/hello#12"));
        assert!(stdout.contains("monalisa wants to merge into main from fix"));
        assert!(stdout.contains("It was broken."));
    }

    #[tokio::test]
    async fn web_opens_browser() {
        let (io, output) = IoStreams::test();
        let io = io.with_tty(true);
        let browser = StubBrowser::new();
        let opts = ViewOptions {
            web: true,
            ..opts()
        };
        run_view(&io, &finder(), &browser, opts).await.unwrap();

        assert_eq!(browser.urls(), vec!["https://github.com/octo/hello/pull/12"]);
        assert_eq!(
            output.stderr(),
            "Opening github.com/octo/hello/pull/12 in your browser.\n"
        );
        assert_eq!(output.stdout(), "");
    }

    #[tokio::test]
    async fn not_found_is_reported() {
        let (io, _) = IoStreams::test();
        let err = run_view(&io, &StubFinder::not_found(), &StubBrowser::new(), opts())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no pull requests found");
    }
}
