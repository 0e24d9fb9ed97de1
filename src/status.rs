//! Wire model of the status collector.

use crate::graph::{ExecutionStatus, Target};
use crate::lifecycle::UpdateReason;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Envelope posted once per lifecycle event
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildUpdateMessage<'a> {
    #[serde(serialize_with = "expose_token")]
    pub access_token: Option<&'a SecretString>,
    /// Shared by every message of one run
    #[serde(rename = "Cookie")]
    pub correlation_id: Uuid,
    pub update_reason: UpdateReason,
    pub time_created: DateTime<Utc>,
    pub status: BuildStatus,
}

fn expose_token<S: Serializer>(
    token: &Option<&SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match token {
        Some(token) => serializer.serialize_some(token.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BuildStatus {
    pub started: DateTime<Utc>,
    /// Host type name, e.g. `GitHubActions`
    pub host: String,
    /// Filtered host fields as a JSON object string
    pub host_information: String,
    pub version: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    /// Most recent first; absent when the history could not be collected
    pub commits: Option<Vec<Commit>>,
    pub targets: Vec<TargetStatus>,
    pub error_message: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TargetStatus {
    #[serde(serialize_with = "timespan::serialize")]
    pub duration: Duration,
    pub status: ExecutionStatus,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl From<&Target> for TargetStatus {
    fn from(target: &Target) -> Self {
        Self {
            duration: target.duration,
            status: target.status,
            name: target.name.clone(),
            data: target.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Commit {
    pub sha: String,
    /// Subject line
    pub message: String,
    pub author: String,
    pub email: String,
}

/// Durations written as `[d.]hh:mm:ss[.fffffff]` time spans
pub mod timespan {
    use crate::constants::TIMESPAN_TICK_DIGITS;
    use serde::Serializer;
    use std::time::Duration;

    const NANOS_PER_TICK: u32 = 100;

    pub fn format(duration: Duration) -> String {
        let total = duration.as_secs();
        let days = total / 86_400;
        let clock = format!(
            "{:02}:{:02}:{:02}",
            (total / 3_600) % 24,
            (total / 60) % 60,
            total % 60
        );
        let clock = if days > 0 {
            format!("{}.{}", days, clock)
        } else {
            clock
        };

        let ticks = duration.subsec_nanos() / NANOS_PER_TICK;
        if ticks > 0 {
            format!("{}.{:0width$}", clock, ticks, width = TIMESPAN_TICK_DIGITS)
        } else {
            clock
        }
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*duration))
    }
}
