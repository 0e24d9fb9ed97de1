use crate::collector::{self, RunMetadata};
use crate::config::NotifierConfig;
use crate::delivery::{DeliveryClient, HttpTransport, Transport};
use crate::error::Result;
use crate::filter::FieldFilter;
use crate::git::{GitProbe, Repository};
use crate::graph::{Build, Target};
use crate::host::{Environment, Host};
use crate::lifecycle::{BuildObserver, UpdateReason};
use crate::logging::LogCapture;
use crate::status::{BuildStatus, BuildUpdateMessage, TargetStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use secrecy::SecretString;
use std::io::Write;
use std::sync::OnceLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Build observer that reports every lifecycle event to the status collector
pub struct Notifier {
    host: Host,
    filter: FieldFilter,
    version: Option<String>,
    access_token: Option<SecretString>,
    git: Box<dyn GitProbe>,
    log: LogCapture,
    delivery: DeliveryClient,
    correlation_id: Uuid,
    run: OnceLock<RunMetadata>,
    last_sent: Mutex<Option<DateTime<Utc>>>,
}

impl Notifier {
    /// Fails when the configuration is invalid or the host has no field
    /// allow-list. Both are fatal: nothing is reported for such a build.
    pub fn new(
        config: NotifierConfig,
        host: Host,
        env: &dyn Environment,
        git: Box<dyn GitProbe>,
        log: LogCapture,
    ) -> Result<Self> {
        config.validate()?;
        let filter = FieldFilter::for_host(&host, config.enable_authorized_actions)?;
        let transport = HttpTransport::new(config.timeout)?;
        let delivery = DeliveryClient::new(config.endpoint()?, config.debug, Box::new(transport));

        Ok(Self {
            version: config.version(env),
            host,
            filter,
            access_token: config.access_token,
            git,
            log,
            delivery,
            correlation_id: Uuid::new_v4(),
            run: OnceLock::new(),
            last_sent: Mutex::new(None),
        })
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.delivery = self.delivery.with_transport(transport);
        self
    }

    pub fn with_debug_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.delivery = self.delivery.with_debug_output(output);
        self
    }

    /// Identifier shared by all messages of this run
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Current status of `build` as it would be reported now
    pub fn snapshot(&self, build: &Build, run: &RunMetadata) -> Result<BuildStatus> {
        Ok(BuildStatus {
            started: run.started,
            host: self.host.type_name().to_string(),
            host_information: self.filter.host_information(&self.host)?,
            version: self.version.clone(),
            repository: run.repository.as_ref().and_then(Repository::https_url),
            branch: run.repository.as_ref().and_then(|r| r.branch.clone()),
            commits: run.commits.clone(),
            targets: build.targets.iter().map(TargetStatus::from).collect(),
            error_message: self.log.joined(),
            exit_code: build.exit_code,
        })
    }

    fn post_status(&self, build: &Build, reason: UpdateReason) {
        let Some(run) = self.run.get() else {
            warn!("Build status {:?} received before the build was created", reason);
            return;
        };

        let status = match self.snapshot(build, run) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Building status snapshot failed");
                return;
            }
        };

        let message = BuildUpdateMessage {
            access_token: self.access_token.as_ref(),
            correlation_id: self.correlation_id,
            update_reason: reason,
            time_created: self.next_timestamp(),
            status,
        };

        self.delivery.deliver(&message);
    }

    /// Wall-clock now, never earlier than the previous message of this run
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_sent.lock();
        let now = Utc::now();
        let stamp = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

impl BuildObserver for Notifier {
    fn on_build_created(&self, build: &Build) {
        if self.run.get().is_some() {
            warn!("Build was already created; ignoring repeated notification");
            return;
        }

        let metadata = collector::collect(self.git.as_ref());
        debug!(
            repository = ?metadata.repository.as_ref().and_then(|r| r.url.as_deref()),
            commits = metadata.commits.as_ref().map_or(0, Vec::len),
            "Collected run metadata"
        );
        // Only fails if already set, which was ruled out above
        let _ = self.run.set(metadata);

        self.post_status(build, UpdateReason::BuildCreated);
    }

    fn on_target_running(&self, build: &Build, target: &Target) {
        debug!(target_name = %target.name, "Target running");
        self.post_status(build, UpdateReason::TargetStarted);
    }

    fn on_build_finished(&self, build: &Build) {
        self.post_status(build, UpdateReason::BuildFinished);
        self.log.clear();
    }
}
