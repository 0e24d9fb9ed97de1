//! Git integration for repository and commit metadata.

use crate::constants::COMMIT_LOG_FORMAT;
use crate::error::{HeraldError, Result};
use crate::status::Commit;
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

/// Local repository descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Remote URL as configured for `origin`; absent for local-only repositories
    pub url: Option<String>,
    /// Current branch; absent on a detached HEAD
    pub branch: Option<String>,
    pub commit: String,
}

impl Repository {
    /// The remote as an HTTPS URL without a trailing `.git`
    pub fn https_url(&self) -> Option<String> {
        let https = to_https(self.url.as_deref()?);
        Some(match https.strip_suffix(".git") {
            Some(stripped) => stripped.to_string(),
            None => https,
        })
    }
}

fn to_https(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map_or(rest, |(_, host)| host);
        // ssh://host:port/path carries a port, not a path separator
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host = host.split_once(':').map_or(host, |(h, _)| h);
        return format!("https://{}/{}", host, path);
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return format!("https://{}", rest);
    }
    // https:// and other schemes such as file:// are kept as they are
    if url.contains("://") {
        return url.to_string();
    }
    // scp-like syntax: [user@]host:path
    if let Some((user_host, path)) = url.split_once(':') {
        let host = user_host.split_once('@').map_or(user_host, |(_, h)| h);
        // A single letter before the colon is a Windows drive, not a host
        let is_host = host.len() > 1 && !host.contains(['/', '\\']);
        if is_host && !path.is_empty() {
            return format!("https://{}/{}", host, path.trim_start_matches('/'));
        }
    }
    url.to_string()
}

/// Git operations the metadata collector depends on
pub trait GitProbe: Send + Sync {
    /// Resolve remote URL, branch and HEAD commit
    fn repository(&self) -> Result<Repository>;

    /// Most recent tag reachable from `rev`, if any
    fn previous_tag(&self, rev: &str) -> Result<Option<String>>;

    /// Raw `git log` lines for `range` in the given pretty format
    fn log(&self, range: &str, format: &str) -> Result<Vec<String>>;
}

/// `GitProbe` backed by the `git` executable
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, operation: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| HeraldError::Git {
                operation: operation.to_string(),
                reason: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HeraldError::Git {
                operation: operation.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

impl GitProbe for GitCli {
    fn repository(&self) -> Result<Repository> {
        let commit = self.run("rev-parse", &["rev-parse", "HEAD"])?;
        let branch = self.run("branch", &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let url = match self.run("remote", &["remote", "get-url", "origin"]) {
            Ok(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "No origin remote; reporting without repository URL");
                None
            }
        };

        Ok(Repository {
            url,
            branch: Some(branch.trim().to_string()).filter(|b| !b.is_empty() && b != "HEAD"),
            commit: commit.trim().to_string(),
        })
    }

    fn previous_tag(&self, rev: &str) -> Result<Option<String>> {
        // describe fails when no tag is reachable; that is not an error here
        match self.run("describe", &["describe", "--tags", "--abbrev=0", rev]) {
            Ok(tag) if !tag.trim().is_empty() => Ok(Some(tag.trim().to_string())),
            Ok(_) | Err(HeraldError::Git { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn log(&self, range: &str, format: &str) -> Result<Vec<String>> {
        let pretty = format!("--pretty=tformat:{}", format);
        let stdout = self.run("log", &["log", range, &pretty])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

fn commit_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^(?P<sha>[^\t]+)\t(?P<author>[^\t]+)\t(?P<email>[^\t]+)\t(?P<message>[^\t]+)$")
            .expect("commit line pattern is valid")
    })
}

/// Parse `git log` output in [`COMMIT_LOG_FORMAT`]; non-matching lines are dropped
pub fn parse_commit_log<S: AsRef<str>>(lines: &[S]) -> Vec<Commit> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = commit_line().captures(line.as_ref())?;
            Some(Commit {
                sha: caps["sha"].to_string(),
                message: caps["message"].to_string(),
                author: caps["author"].to_string(),
                email: caps["email"].to_string(),
            })
        })
        .collect()
}

/// Commits from the previous tag up to `head`, most recent first.
///
/// Returns `None` when git fails or nothing parseable comes back.
pub fn recent_commits(git: &dyn GitProbe, head: &str) -> Option<Vec<Commit>> {
    let range = match git.previous_tag(&format!("{}^", head)) {
        Ok(Some(tag)) => format!("{}..{}", tag, head),
        _ => format!("{}^..", head),
    };

    let lines = match git.log(&range, COMMIT_LOG_FORMAT) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::debug!(range = %range, error = %e, "Commit history unavailable");
            return None;
        }
    };

    let commits = parse_commit_log(&lines[..]);
    if commits.is_empty() {
        tracing::debug!(range = %range, "No commits parsed from git log");
        return None;
    }
    Some(commits)
}
