//! Integration tests for Strata

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const WEB_PROJECT: &str = r#"
[image]
name = "web"
from = "alpine:3.19"

[[stage]]
name = "install"
commands = ["apk add --no-cache make"]
"#;

    /// Command isolated from the user's configuration
    fn strata(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("strata");
        cmd.env("STRATA_CONFIG", home.path().join("config.toml"))
            .env("HOME", home.path())
            .env_remove("XDG_STATE_HOME")
            .env_remove("XDG_DATA_HOME")
            .env("CI", "1");
        cmd
    }

    fn project(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strata.toml"), content).unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        strata(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("incremental container image builds"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        strata(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("strata"));
    }

    #[test]
    fn config_path_follows_flag() {
        let home = TempDir::new().unwrap();
        strata(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        strata(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[sidecar]"))
            .stdout(predicate::str::contains("dappdeps/gitartifact"));
    }

    #[test]
    fn invalid_config_fails() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[runtime\n").unwrap();
        strata(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn plan_plain_lists_stages() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);
        strata(&home)
            .args(["plan", "--format", "plain", "-p"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("from strata-web:"))
            .stdout(predicate::str::contains("install strata-web:"));
    }

    #[test]
    fn plan_json_is_stable() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);

        let run = || {
            let output = strata(&home)
                .args(["plan", "--format", "json", "-p"])
                .arg(dir.path())
                .output()
                .unwrap();
            assert!(output.status.success());
            serde_json::from_slice::<serde_json::Value>(&output.stdout).unwrap()
        };

        let first = run();
        assert_eq!(first.as_array().unwrap().len(), 2);
        assert_eq!(first[0]["kind"], "base");
        assert_eq!(first[1]["name"], "install");
        assert_eq!(first, run());
    }

    #[test]
    fn plan_finds_project_in_parent() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);
        let nested = dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        strata(&home)
            .args(["plan", "-f", "plain", "-p"])
            .arg(&nested)
            .assert()
            .success()
            .stdout(predicate::str::contains("install"));
    }

    #[test]
    fn plan_without_project_fails() {
        let home = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        strata(&home)
            .args(["plan", "-p"])
            .arg(empty.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("No strata.toml found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn plan_rejects_reserved_stage() {
        let home = TempDir::new().unwrap();
        let dir = project("[image]\nname = \"web\"\nfrom = \"alpine\"\n[[stage]]\nname = \"from\"\n");
        strata(&home)
            .args(["plan", "-p"])
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("reserved"));
    }

    #[test]
    fn plan_fails_for_repo_without_commits() {
        let home = TempDir::new().unwrap();
        let dir = project(
            "[image]\nname = \"web\"\nfrom = \"alpine\"\n[[repo]]\nname = \"app\"\nto = \"/app\"\n",
        );
        strata(&home)
            .args(["plan", "-p"])
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("did not report a commit"));
    }

    #[test]
    fn ledger_list_empty() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);
        strata(&home)
            .args(["ledger", "list", "-p"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("No recorded commits"));
    }

    #[test]
    fn ledger_list_and_clear() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);
        let ledger = dir.path().join(".strata-build").join("ledger");
        fs::create_dir_all(&ledger).unwrap();
        fs::write(
            ledger.join("app.source_archive.p1.c1.commit"),
            "0123456789abcdef\n",
        )
        .unwrap();

        strata(&home)
            .args(["ledger", "list", "-f", "plain", "-p"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("app source_archive 0123456789abcdef"));

        strata(&home)
            .args(["ledger", "clear", "-y", "-p"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 recorded commit(s)"));

        assert!(!ledger.join("app.source_archive.p1.c1.commit").exists());
    }

    #[test]
    fn ledger_clear_without_yes_keeps_entries() {
        let home = TempDir::new().unwrap();
        let dir = project(WEB_PROJECT);
        let ledger = dir.path().join(".strata-build").join("ledger");
        fs::create_dir_all(&ledger).unwrap();
        let entry = ledger.join("app.source_archive.p1.c1.commit");
        fs::write(&entry, "abc").unwrap();

        strata(&home)
            .args(["ledger", "clear", "-p"])
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Cancelled"));

        assert!(entry.exists());
    }

    #[test]
    fn unsupported_runtime_fails_build() {
        let home = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[runtime]\nbinary = \"nerdctl\"\n",
        )
        .unwrap();
        let dir = project(WEB_PROJECT);

        strata(&home)
            .args(["build", "-p"])
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported container runtime"));
    }
}
