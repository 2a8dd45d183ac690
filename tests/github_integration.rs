//! Integration tests for the GitHub forge.
//!
//! These tests run `GitHubForge` against a local wiremock server, covering
//! request shapes, pagination and error mapping, and the run log cache on
//! top of a real HTTP download.

use std::io::{Cursor, Write};

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ghr::core::types::Repo;
use ghr::forge::github::GitHubForge;
use ghr::forge::{Conclusion, Forge, ForgeError, RunStatus};
use ghr::run::logs::{get_run_log, RunLogCache};

fn repo() -> Repo {
    Repo::new("octo", "hello")
}

async fn forge() -> (MockServer, GitHubForge) {
    let server = MockServer::start().await;
    let forge = GitHubForge::with_api_base("github.com", Some("t0ken".into()), server.uri());
    (server, forge)
}

fn run_json() -> serde_json::Value {
    serde_json::json!({
        "id": 42,
        "name": "CI",
        "display_title": "Fix the frobnicator",
        "status": "completed",
        "conclusion": "failure",
        "head_branch": "fix",
        "head_sha": "abc123",
        "event": "push",
        "run_attempt": 2,
        "run_started_at": "2024-05-01T12:00:00Z",
        "created_at": "2024-05-01T11:59:00Z",
        "html_url": "https://github.com/octo/hello/actions/runs/42"
    })
}

fn job_json(id: u64, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "status": "completed",
        "conclusion": "success",
        "steps": [
            { "name": "checkout", "status": "completed", "conclusion": "success", "number": 1 }
        ],
        "started_at": "2024-05-01T12:00:00Z",
        "completed_at": "2024-05-01T12:01:00Z",
        "html_url": format!("https://github.com/octo/hello/actions/runs/42/job/{id}"),
        "run_id": 42
    })
}

fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

mod runs {
    use super::*;

    #[tokio::test]
    async fn fetches_run_with_auth() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_json()))
            .expect(1)
            .mount(&server)
            .await;

        let run = forge.workflow_run(&repo(), 42, None).await.unwrap();
        assert_eq!(run.id, 42);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.conclusion, Some(Conclusion::Failure));
        assert_eq!(run.run_attempt, 2);
        assert_eq!(run.started_time().to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn attempt_path() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42/attempts/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_json()))
            .expect(1)
            .mount(&server)
            .await;

        forge.workflow_run(&repo(), 42, Some(1)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_status_values_are_tolerated() {
        let (server, forge) = forge().await;
        let mut body = run_json();
        body["status"] = "brand_new_status".into();
        body["conclusion"] = serde_json::Value::Null;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let run = forge.workflow_run(&repo(), 42, None).await.unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert_eq!(run.conclusion, None);
    }

    #[tokio::test]
    async fn jobs_are_paginated() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42/jobs"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 2,
                "jobs": [job_json(1, "build")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42/jobs"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 2,
                "jobs": [job_json(2, "test")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let jobs = forge.run_jobs(&repo(), 42, None).await.unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["build", "test"]);
        assert_eq!(jobs[0].steps[0].number, 1);
    }

    #[tokio::test]
    async fn missing_log_archive() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42/logs"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})),
            )
            .mount(&server)
            .await;

        let err = forge.run_log_archive(&repo(), 42, None).await.unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(ref m) if m == "log not found"));
    }

    #[tokio::test]
    async fn job_log_text() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/jobs/7/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("line one\nline two\n"))
            .mount(&server)
            .await;

        let log = forge.job_log(&repo(), 7).await.unwrap();
        assert_eq!(log, "line one\nline two\n");
    }

    #[tokio::test]
    async fn log_archive_is_cached() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_json()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/runs/42/logs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_archive(&[("0_build.txt", "hello from build\n")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = RunLogCache::new(dir.path());
        let run = forge.workflow_run(&repo(), 42, None).await.unwrap();

        for _ in 0..2 {
            let archive = get_run_log(&cache, &forge, &repo(), &run, None).await.unwrap();
            assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["0_build.txt"]);
        }
        assert!(cache.exists(&RunLogCache::key(&run)).unwrap());
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn missing_token() {
        let server = MockServer::start().await;
        let forge = GitHubForge::with_api_base("github.com", None, server.uri());

        let err = forge.workflow_run(&repo(), 42, None).await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthRequired));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn rate_limited() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/jobs/1"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                serde_json::json!({"message": "API rate limit exceeded for user"}),
            ))
            .mount(&server)
            .await;

        let err = forge.job(&repo(), 1).await.unwrap_err();
        assert!(matches!(err, ForgeError::RateLimited));
    }

    #[tokio::test]
    async fn unauthorized() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/actions/jobs/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = forge.job(&repo(), 1).await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthFailed(_)));
    }
}

mod graphql {
    use super::*;

    #[tokio::test]
    async fn current_login() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "viewer": { "login": "monalisa" } }
            })))
            .mount(&server)
            .await;

        assert_eq!(forge.current_login().await.unwrap(), "monalisa");
    }

    #[tokio::test]
    async fn graphql_not_found() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a Repository" }]
            })))
            .mount(&server)
            .await;

        let err = forge.repository(&repo()).await.unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn fork_via_rest() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/forks"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "node_id": "R_fork",
                "name": "hello",
                "owner": { "login": "monalisa" },
                "default_branch": "main"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fork = forge.fork_repo(&repo()).await.unwrap();
        assert_eq!(fork.repo.full_name(), "monalisa/hello");
        assert_eq!(fork.parent.map(|p| p.full_name()).as_deref(), Some("octo/hello"));
    }
}
