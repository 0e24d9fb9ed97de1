use crate::git::{recent_commits, GitProbe, Repository};
use crate::status::Commit;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Per-run metadata captured once when the build is created
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub started: DateTime<Utc>,
    pub repository: Option<Repository>,
    pub commits: Option<Vec<Commit>>,
}

/// Snapshot start time, repository and recent history. Git failures leave
/// the affected values absent.
pub fn collect(git: &dyn GitProbe) -> RunMetadata {
    let started = Utc::now();

    let repository = match git.repository() {
        Ok(repository) => Some(repository),
        Err(e) => {
            debug!(error = %e, "Repository metadata unavailable");
            None
        }
    };
    let commits = repository
        .as_ref()
        .and_then(|r| recent_commits(git, &r.commit));

    RunMetadata {
        started,
        repository,
        commits,
    }
}
