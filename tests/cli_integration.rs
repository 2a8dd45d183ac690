//! Integration tests for the ghr binary.
//!
//! These tests exercise flag validation and exit codes end to end. They
//! never reach the network: every case fails or finishes before a forge
//! client is used.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A ghr command isolated from the user's config and environment.
fn ghr(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ghr").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("GHR_CACHE_DIR", home.path().join("cache"))
        .env_remove("GHR_CONFIG")
        .env_remove("GH_TOKEN")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GH_REPO")
        .env_remove("GH_HOST")
        .write_stdin("");
    cmd
}

#[test]
fn version_flag_works() {
    let home = TempDir::new().unwrap();
    ghr(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ghr"));
}

#[test]
fn completion_script() {
    let home = TempDir::new().unwrap();
    ghr(&home)
        .args(["completion", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef ghr"));
}

mod pr_create {
    use super::*;

    #[test]
    fn needs_title_and_body_without_tty() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["pr", "create"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "must provide `--title` and `--body`",
            ));
    }

    #[test]
    fn draft_and_web_conflict() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["pr", "create", "--draft", "--web"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "the `--draft` flag is not supported with `--web`",
            ));
    }

    #[test]
    fn fill_conflicts() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["pr", "create", "--fill", "--fill-first"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "`--fill` is not supported with `--fill-first`",
            ));
    }
}

mod pr_edit {
    use super::*;

    #[test]
    fn milestone_flags_conflict() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["pr", "edit", "1", "--milestone", "v1", "--remove-milestone"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "specify only one of `--milestone` or `--remove-milestone`",
            ));
    }

    #[test]
    fn nothing_to_edit() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["pr", "edit", "1"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "required when not running interactively",
            ));
    }
}

mod run_view {
    use super::*;

    #[test]
    fn web_and_log_conflict() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["run", "view", "1", "--web", "--log"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("specify only one of --web or --log"));
    }

    #[test]
    fn log_and_log_failed_conflict() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["run", "view", "1", "--log", "--log-failed"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "specify only one of --log or --log-failed",
            ));
    }

    #[test]
    fn outside_a_repository() {
        let home = TempDir::new().unwrap();
        ghr(&home)
            .args(["run", "view", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::is_empty().not());
    }
}

#[test]
fn invalid_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.toml");
    std::fs::write(&config, "no_such_key = true\n").unwrap();

    ghr(&home)
        .env("GHR_CONFIG", &config)
        .args(["run", "view", "1"])
        .assert()
        .code(1);
}
