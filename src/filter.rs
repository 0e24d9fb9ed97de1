//! Per-provider allow-lists deciding which host fields leave the process.

use crate::error::{HeraldError, Result};
use crate::host::Host;
use serde_json::{Map, Value};

const APPVEYOR_FIELDS: &[&str] = &[
    "Url",
    "AccountName",
    "ProjectSlug",
    "BuildId",
    "BuildVersion",
    "JobName",
    "JobId",
    "RepositoryBranch",
    "ProjectName",
];

const TEAMCITY_FIELDS: &[&str] = &[
    "ServerUrl",
    "ProjectName",
    "ProjectId",
    "BuildTypeId",
    "BuildId",
    "BuildNumber",
    "BuildConfiguration",
    "BranchName",
];
const TEAMCITY_AUTHORIZED_FIELDS: &[&str] = &["AuthUserId", "AuthPassword"];

const AZURE_PIPELINES_FIELDS: &[&str] = &[
    "TeamFoundationCollectionUri",
    "TeamProject",
    "DefinitionName",
    "DefinitionId",
    "BuildId",
    "BuildNumber",
    "StageName",
    "JobId",
    "TaskInstanceId",
];
const AZURE_PIPELINES_AUTHORIZED_FIELDS: &[&str] = &["AccessToken"];

const GITHUB_ACTIONS_FIELDS: &[&str] = &[
    "ServerUrl",
    "Repository",
    "Workflow",
    "RunId",
    "RunNumber",
    "JobId",
    "Job",
    "Ref",
];
const GITHUB_ACTIONS_AUTHORIZED_FIELDS: &[&str] = &["Token"];

const GITLAB_FIELDS: &[&str] = &["ProjectUrl", "PipelineId", "ProjectName"];

/// Inclusion policy for the fields of one host type
#[derive(Debug, Clone, Copy)]
pub struct FieldFilter {
    public: &'static [&'static str],
    authorized: &'static [&'static str],
    enable_authorized_actions: bool,
}

impl FieldFilter {
    /// Resolve the policy for `host`.
    ///
    /// Hosts without an allow-list are rejected: serializing them unfiltered
    /// would send every field, credentials included.
    pub fn for_host(host: &Host, enable_authorized_actions: bool) -> Result<Self> {
        let (public, authorized): (&'static [&'static str], &'static [&'static str]) = match host {
            Host::AppVeyor(_) => (APPVEYOR_FIELDS, &[]),
            Host::TeamCity(_) => (TEAMCITY_FIELDS, TEAMCITY_AUTHORIZED_FIELDS),
            Host::AzurePipelines(_) => (AZURE_PIPELINES_FIELDS, AZURE_PIPELINES_AUTHORIZED_FIELDS),
            Host::GitHubActions(_) => (GITHUB_ACTIONS_FIELDS, GITHUB_ACTIONS_AUTHORIZED_FIELDS),
            Host::GitLab(_) => (GITLAB_FIELDS, &[]),
            Host::Terminal | Host::Unsupported { .. } => {
                return Err(HeraldError::UnsupportedHost {
                    host: host.type_name().to_string(),
                })
            }
        };

        Ok(Self {
            public,
            authorized,
            enable_authorized_actions,
        })
    }

    /// Whether a field with this name is serialized. Case-insensitive.
    pub fn includes(&self, field: &str) -> bool {
        let listed = |list: &[&str]| list.iter().any(|f| f.eq_ignore_ascii_case(field));
        listed(self.public) || (self.enable_authorized_actions && listed(self.authorized))
    }

    /// Project the host onto its allowed fields
    pub fn project(&self, host: &Host) -> Map<String, Value> {
        host.fields()
            .into_iter()
            .filter(|(name, _)| self.includes(name))
            .map(|(name, value)| {
                let value = value.map_or(Value::Null, |v| Value::String(v.to_string()));
                (name.to_string(), value)
            })
            .collect()
    }

    /// The filtered host serialized as a JSON object string
    pub fn host_information(&self, host: &Host) -> Result<String> {
        Ok(serde_json::to_string(&self.project(host))?)
    }
}
