//! CI host descriptors.
//!
//! Each supported provider is a plain struct of optional string fields read
//! from its environment. `fields()` lists every field under the name used on
//! the wire, which is what the field filter matches against.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Source of environment variables
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment; empty values count as unset
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

macro_rules! ci_host {
    ($(#[$meta:meta])* $name:ident { $($field:ident as $wire:literal => $key:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: Option<String>,)+
        }

        impl $name {
            /// Populate every field by looking up its source key
            pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
                Self {
                    $($field: lookup($key),)+
                }
            }

            /// Every field in declaration order, keyed by wire name
            pub fn fields(&self) -> Vec<(&'static str, Option<&str>)> {
                vec![$(($wire, self.$field.as_deref()),)+]
            }
        }
    };
}

ci_host!(
    /// AppVeyor build worker
    AppVeyor {
        url as "Url" => "APPVEYOR_URL",
        api_url as "ApiUrl" => "APPVEYOR_API_URL",
        account_name as "AccountName" => "APPVEYOR_ACCOUNT_NAME",
        project_id as "ProjectId" => "APPVEYOR_PROJECT_ID",
        project_name as "ProjectName" => "APPVEYOR_PROJECT_NAME",
        project_slug as "ProjectSlug" => "APPVEYOR_PROJECT_SLUG",
        build_folder as "BuildFolder" => "APPVEYOR_BUILD_FOLDER",
        build_id as "BuildId" => "APPVEYOR_BUILD_ID",
        build_number as "BuildNumber" => "APPVEYOR_BUILD_NUMBER",
        build_version as "BuildVersion" => "APPVEYOR_BUILD_VERSION",
        build_worker_image as "BuildWorkerImage" => "APPVEYOR_BUILD_WORKER_IMAGE",
        job_id as "JobId" => "APPVEYOR_JOB_ID",
        job_name as "JobName" => "APPVEYOR_JOB_NAME",
        job_number as "JobNumber" => "APPVEYOR_JOB_NUMBER",
        repository_name as "RepositoryName" => "APPVEYOR_REPO_NAME",
        repository_branch as "RepositoryBranch" => "APPVEYOR_REPO_BRANCH",
        repository_commit_sha as "RepositoryCommitSha" => "APPVEYOR_REPO_COMMIT",
        repository_commit_author as "RepositoryCommitAuthor" => "APPVEYOR_REPO_COMMIT_AUTHOR",
        repository_commit_author_email as "RepositoryCommitAuthorEmail" => "APPVEYOR_REPO_COMMIT_AUTHOR_EMAIL",
        repository_commit_message as "RepositoryCommitMessage" => "APPVEYOR_REPO_COMMIT_MESSAGE",
        pull_request_number as "PullRequestNumber" => "APPVEYOR_PULL_REQUEST_NUMBER",
        pull_request_title as "PullRequestTitle" => "APPVEYOR_PULL_REQUEST_TITLE",
    }
);

ci_host!(
    /// TeamCity agent. Keys are TeamCity build property names.
    TeamCity {
        server_url as "ServerUrl" => "teamcity.serverUrl",
        project_name as "ProjectName" => "teamcity.projectName",
        project_id as "ProjectId" => "teamcity.project.id",
        build_type_id as "BuildTypeId" => "teamcity.buildType.id",
        build_id as "BuildId" => "teamcity.build.id",
        build_number as "BuildNumber" => "build.number",
        build_configuration as "BuildConfiguration" => "teamcity.buildConfName",
        branch_name as "BranchName" => "teamcity.build.branch",
        build_vcs_number as "BuildVcsNumber" => "build.vcs.number",
        agent_name as "AgentName" => "agent.name",
        version as "Version" => "teamcity.version",
        auth_user_id as "AuthUserId" => "teamcity.auth.userId",
        auth_password as "AuthPassword" => "teamcity.auth.password",
    }
);

ci_host!(
    /// Azure Pipelines agent
    AzurePipelines {
        team_foundation_collection_uri as "TeamFoundationCollectionUri" => "SYSTEM_TEAMFOUNDATIONCOLLECTIONURI",
        team_project as "TeamProject" => "SYSTEM_TEAMPROJECT",
        team_project_id as "TeamProjectId" => "SYSTEM_TEAMPROJECTID",
        definition_name as "DefinitionName" => "BUILD_DEFINITIONNAME",
        definition_id as "DefinitionId" => "SYSTEM_DEFINITIONID",
        build_id as "BuildId" => "BUILD_BUILDID",
        build_number as "BuildNumber" => "BUILD_BUILDNUMBER",
        stage_name as "StageName" => "SYSTEM_STAGENAME",
        job_id as "JobId" => "SYSTEM_JOBID",
        job_display_name as "JobDisplayName" => "SYSTEM_JOBDISPLAYNAME",
        task_instance_id as "TaskInstanceId" => "SYSTEM_TASKINSTANCEID",
        agent_name as "AgentName" => "AGENT_NAME",
        source_branch as "SourceBranch" => "BUILD_SOURCEBRANCH",
        source_version as "SourceVersion" => "BUILD_SOURCEVERSION",
        repository_uri as "RepositoryUri" => "BUILD_REPOSITORY_URI",
        requested_for as "RequestedFor" => "BUILD_REQUESTEDFOR",
        requested_for_email as "RequestedForEmail" => "BUILD_REQUESTEDFOREMAIL",
        access_token as "AccessToken" => "SYSTEM_ACCESSTOKEN",
    }
);

ci_host!(
    /// GitHub Actions runner. The runner does not export a numeric job id;
    /// `JobId` is only populated when the workflow exports `GITHUB_JOB_ID`.
    GitHubActions {
        server_url as "ServerUrl" => "GITHUB_SERVER_URL",
        api_url as "ApiUrl" => "GITHUB_API_URL",
        repository as "Repository" => "GITHUB_REPOSITORY",
        repository_owner as "RepositoryOwner" => "GITHUB_REPOSITORY_OWNER",
        workflow as "Workflow" => "GITHUB_WORKFLOW",
        run_id as "RunId" => "GITHUB_RUN_ID",
        run_number as "RunNumber" => "GITHUB_RUN_NUMBER",
        run_attempt as "RunAttempt" => "GITHUB_RUN_ATTEMPT",
        job_id as "JobId" => "GITHUB_JOB_ID",
        job as "Job" => "GITHUB_JOB",
        git_ref as "Ref" => "GITHUB_REF",
        head_ref as "HeadRef" => "GITHUB_HEAD_REF",
        base_ref as "BaseRef" => "GITHUB_BASE_REF",
        sha as "Sha" => "GITHUB_SHA",
        actor as "Actor" => "GITHUB_ACTOR",
        event_name as "EventName" => "GITHUB_EVENT_NAME",
        workspace as "Workspace" => "GITHUB_WORKSPACE",
        token as "Token" => "GITHUB_TOKEN",
    }
);

ci_host!(
    /// GitLab CI runner
    GitLab {
        server_url as "ServerUrl" => "CI_SERVER_URL",
        project_url as "ProjectUrl" => "CI_PROJECT_URL",
        project_id as "ProjectId" => "CI_PROJECT_ID",
        project_name as "ProjectName" => "CI_PROJECT_NAME",
        project_path as "ProjectPath" => "CI_PROJECT_PATH",
        pipeline_id as "PipelineId" => "CI_PIPELINE_ID",
        pipeline_source as "PipelineSource" => "CI_PIPELINE_SOURCE",
        job_id as "JobId" => "CI_JOB_ID",
        job_name as "JobName" => "CI_JOB_NAME",
        job_stage as "JobStage" => "CI_JOB_STAGE",
        commit_sha as "CommitSha" => "CI_COMMIT_SHA",
        commit_ref_name as "CommitRefName" => "CI_COMMIT_REF_NAME",
        user_email as "UserEmail" => "GITLAB_USER_EMAIL",
        job_token as "JobToken" => "CI_JOB_TOKEN",
    }
);

/// The CI provider the build is running under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    AppVeyor(AppVeyor),
    TeamCity(TeamCity),
    AzurePipelines(AzurePipelines),
    GitHubActions(GitHubActions),
    GitLab(GitLab),
    /// Local run outside any CI
    Terminal,
    /// A recognised provider with no field allow-list
    Unsupported { name: String },
}

impl Host {
    /// Detect the current host from well-known marker variables
    pub fn detect(env: &dyn Environment) -> Host {
        let lookup = |key: &str| env.var(key);

        let host = if env.var("APPVEYOR").is_some() {
            Host::AppVeyor(AppVeyor::from_lookup(&lookup))
        } else if env.var("TEAMCITY_VERSION").is_some() {
            Host::TeamCity(teamcity_from_env(env))
        } else if env.var("TF_BUILD").is_some() {
            Host::AzurePipelines(AzurePipelines::from_lookup(&lookup))
        } else if env.var("GITHUB_ACTIONS").is_some() {
            Host::GitHubActions(GitHubActions::from_lookup(&lookup))
        } else if env.var("GITLAB_CI").is_some() {
            Host::GitLab(GitLab::from_lookup(&lookup))
        } else if env.var("JENKINS_URL").is_some() {
            Host::Unsupported {
                name: "Jenkins".to_string(),
            }
        } else if env.var("TRAVIS").is_some() {
            Host::Unsupported {
                name: "Travis".to_string(),
            }
        } else if env.var("BITBUCKET_BUILD_NUMBER").is_some() {
            Host::Unsupported {
                name: "Bitbucket".to_string(),
            }
        } else {
            Host::Terminal
        };

        debug!(host = host.type_name(), "Detected CI host");
        host
    }

    pub fn type_name(&self) -> &str {
        match self {
            Host::AppVeyor(_) => "AppVeyor",
            Host::TeamCity(_) => "TeamCity",
            Host::AzurePipelines(_) => "AzurePipelines",
            Host::GitHubActions(_) => "GitHubActions",
            Host::GitLab(_) => "GitLab",
            Host::Terminal => "Terminal",
            Host::Unsupported { name } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Host::Terminal)
    }

    /// All fields of the host, unfiltered
    pub fn fields(&self) -> Vec<(&'static str, Option<&str>)> {
        match self {
            Host::AppVeyor(h) => h.fields(),
            Host::TeamCity(h) => h.fields(),
            Host::AzurePipelines(h) => h.fields(),
            Host::GitHubActions(h) => h.fields(),
            Host::GitLab(h) => h.fields(),
            Host::Terminal | Host::Unsupported { .. } => Vec::new(),
        }
    }
}

/// Environment fallbacks for properties TeamCity also exports as variables
const TEAMCITY_ENV_FALLBACKS: &[(&str, &str)] = &[
    ("teamcity.version", "TEAMCITY_VERSION"),
    ("teamcity.projectName", "TEAMCITY_PROJECT_NAME"),
    ("teamcity.buildConfName", "TEAMCITY_BUILDCONF_NAME"),
    ("build.number", "BUILD_NUMBER"),
    ("build.vcs.number", "BUILD_VCS_NUMBER"),
];

fn teamcity_from_env(env: &dyn Environment) -> TeamCity {
    let mut properties = BTreeMap::new();

    if let Some(path) = env.var("TEAMCITY_BUILD_PROPERTIES_FILE") {
        properties.extend(read_properties(Path::new(&path)));
        // The configuration file carries server URL, project id and branch
        if let Some(config) = properties.get("teamcity.configuration.properties.file").cloned() {
            properties.extend(read_properties(Path::new(&config)));
        }
    }

    let lookup = |key: &str| {
        properties.get(key).cloned().or_else(|| {
            TEAMCITY_ENV_FALLBACKS
                .iter()
                .find(|(property, _)| *property == key)
                .and_then(|(_, var)| env.var(var))
        })
    };

    TeamCity::from_lookup(&lookup)
}

fn read_properties(path: &Path) -> BTreeMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_properties(&content),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot read TeamCity properties");
            BTreeMap::new()
        }
    }
}

/// Parse the `key=value` subset of the Java properties format TeamCity writes
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter_map(|l| {
            let split = unescaped_separator(l)?;
            let key = unescape(l[..split].trim());
            let value = unescape(l[split + 1..].trim());
            Some((key, value))
        })
        .collect()
}

fn unescaped_separator(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '=' | ':' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
