mod common;

use anyhow::bail;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::CollectorStub;
use herald::config::NotifierConfig;
use herald::engine::BuildEngine;
use herald::error::{HeraldError, Result};
use herald::git::{GitProbe, Repository};
use herald::host::Host;
use herald::logging::LogCapture;
use herald::notifier::Notifier;
use secrecy::SecretString;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

struct StubGit;

impl GitProbe for StubGit {
    fn repository(&self) -> Result<Repository> {
        Ok(Repository {
            url: Some("git@github.com:org/herald.git".to_string()),
            branch: Some("main".to_string()),
            commit: "c0ffee".to_string(),
        })
    }

    fn previous_tag(&self, _rev: &str) -> Result<Option<String>> {
        Ok(Some("v0.9.0".to_string()))
    }

    fn log(&self, range: &str, _format: &str) -> Result<Vec<String>> {
        if range != "v0.9.0..c0ffee" {
            return Err(HeraldError::Git {
                operation: "log".to_string(),
                reason: format!("unexpected range {}", range),
            });
        }
        Ok(vec![
            "c0ffee\tJane Doe\tjane@example.com\tAdd status reporting".to_string(),
            "beef00\tJohn Roe\tjohn@example.com\tBump version".to_string(),
        ])
    }
}

fn github_env() -> BTreeMap<String, String> {
    [
        ("GITHUB_ACTIONS", "true"),
        ("GITHUB_REPOSITORY", "org/herald"),
        ("GITHUB_RUN_ID", "4242"),
        ("GITHUB_JOB", "build"),
        ("GITHUB_TOKEN", "ghs_should_not_leak"),
        ("GITVERSION_FULLSEMVER", "1.0.0-rc.1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn run_build(stub: &CollectorStub) -> Vec<Value> {
    let env = github_env();
    let log = LogCapture::new();
    let config = NotifierConfig {
        server_url: Some(stub.base_url.clone()),
        access_token: Some(SecretString::from("collector-token".to_string())),
        version_parameter: Some("GITVERSION_FULLSEMVER".to_string()),
        ..NotifierConfig::default()
    };
    let notifier = Notifier::new(config, Host::detect(&env), &env, Box::new(StubGit), log.clone()).unwrap();

    let mut engine = BuildEngine::new().with_observer(Arc::new(notifier));
    let compile = engine.add_target(
        "Compile",
        &[],
        Some(Box::new(|summary: &mut BTreeMap<String, String>| -> anyhow::Result<()> {
            summary.insert("Artifacts".to_string(), "3".to_string());
            Ok(())
        })),
    );
    let test = engine.add_target(
        "Test",
        &[compile],
        Some(Box::new(|_: &mut BTreeMap<String, String>| -> anyhow::Result<()> {
            bail!("2 tests failed")
        })),
    );
    engine.add_target("Publish", &[test], None);

    let build = tracing::subscriber::with_default(Registry::default().with(log.layer()), || {
        engine.execute().unwrap()
    });
    assert_eq!(build.exit_code, Some(1));

    stub.received()
}

#[test]
fn test_lifecycle_posts_in_order_with_one_cookie() {
    let stub = CollectorStub::start(StatusCode::OK);
    let received = run_build(&stub);

    let reasons: Vec<&str> = received
        .iter()
        .map(|m| m["UpdateReason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        vec!["BuildCreated", "TargetStarted", "TargetStarted", "BuildFinished"]
    );

    let cookie = &received[0]["Cookie"];
    assert!(received.iter().all(|m| &m["Cookie"] == cookie));

    let stamps: Vec<DateTime<Utc>> = received
        .iter()
        .map(|m| m["TimeCreated"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

    let started = &received[0]["Status"]["Started"];
    assert!(received.iter().all(|m| &m["Status"]["Started"] == started));
}

#[test]
fn test_final_status_reflects_settled_build() {
    let stub = CollectorStub::start(StatusCode::OK);
    let received = run_build(&stub);
    let status = &received.last().unwrap()["Status"];

    assert_eq!(status["ExitCode"], 1);
    assert_eq!(status["Host"], "GitHubActions");
    assert_eq!(status["Version"], "1.0.0-rc.1");
    assert_eq!(status["Repository"], "https://github.com/org/herald");
    assert_eq!(status["Branch"], "main");

    let targets = status["Targets"].as_array().unwrap();
    let by_name = |name: &str| targets.iter().find(|t| t["Name"] == name).unwrap();
    assert_eq!(by_name("Compile")["Status"], "Succeeded");
    assert_eq!(by_name("Compile")["Data"]["Artifacts"], "3");
    assert_eq!(by_name("Test")["Status"], "Failed");
    assert_eq!(by_name("Publish")["Status"], "Skipped");

    let commits = status["Commits"].as_array().unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0]["Sha"], "c0ffee");
    assert_eq!(commits[0]["Message"], "Add status reporting");

    assert!(status["ErrorMessage"].as_str().unwrap().contains("2 tests failed"));
}

#[test]
fn test_running_snapshot_shows_live_target_state() {
    let stub = CollectorStub::start(StatusCode::OK);
    let received = run_build(&stub);

    // Second message is Compile starting
    let targets = received[1]["Status"]["Targets"].as_array().unwrap();
    assert_eq!(targets[0]["Name"], "Compile");
    assert_eq!(targets[0]["Status"], "Running");
    assert_eq!(targets[1]["Status"], "NotRun");
    assert!(received[1]["Status"]["ExitCode"].is_null());
    assert_eq!(received[1]["Status"]["ErrorMessage"], "");
}

#[test]
fn test_host_information_excludes_sensitive_fields() {
    let stub = CollectorStub::start(StatusCode::OK);
    let received = run_build(&stub);

    for message in &received {
        let info = message["Status"]["HostInformation"].as_str().unwrap();
        let fields: Value = serde_json::from_str(info).unwrap();
        assert_eq!(fields["Repository"], "org/herald");
        assert_eq!(fields["RunId"], "4242");
        assert!(fields.get("Token").is_none());
        assert!(!info.contains("ghs_should_not_leak"));
    }
}

#[test]
fn test_two_target_run_reports_each_reason() {
    let stub = CollectorStub::start(StatusCode::OK);
    let env = github_env();
    let config = NotifierConfig {
        server_url: Some(stub.base_url.clone()),
        access_token: Some(SecretString::from("collector-token".to_string())),
        ..NotifierConfig::default()
    };
    let notifier =
        Notifier::new(config, Host::detect(&env), &env, Box::new(StubGit), LogCapture::new()).unwrap();
    let cookie = notifier.correlation_id().to_string();

    let mut engine = BuildEngine::new().with_observer(Arc::new(notifier));
    let a = engine.add_target("A", &[], None);
    engine.add_target("B", &[a], None);
    let build = engine.execute().unwrap();
    assert_eq!(build.exit_code, Some(0));

    let received = stub.received();
    let reasons: Vec<&str> = received
        .iter()
        .map(|m| m["UpdateReason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        vec!["BuildCreated", "TargetStarted", "TargetStarted", "BuildFinished"]
    );
    assert!(received.iter().all(|m| m["Cookie"] == cookie.as_str()));

    let last = &received[3]["Status"]["Targets"];
    assert_eq!(last[0]["Name"], "A");
    assert_eq!(last[0]["Status"], "Succeeded");
    assert_eq!(last[1]["Name"], "B");
    assert_eq!(last[1]["Status"], "Succeeded");
    assert_eq!(received[3]["Status"]["ExitCode"], 0);
}
