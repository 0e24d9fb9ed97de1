use crate::error::Result;
use crate::graph::{Build, ExecutionStatus, Target};
use crate::lifecycle::BuildObserver;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Work performed by a target. Entries written to the map become the
/// target's summary information.
pub type Action = Box<dyn FnMut(&mut BTreeMap<String, String>) -> anyhow::Result<()> + Send>;

/// Sequential target runner that drives the lifecycle hooks of its observers
pub struct BuildEngine {
    build: Build,
    actions: Vec<Option<Action>>,
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl BuildEngine {
    pub fn new() -> Self {
        Self {
            build: Build::new(),
            actions: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Register a target; returns its index for use in `deps` of later targets
    pub fn add_target(&mut self, name: &str, deps: &[usize], action: Option<Action>) -> usize {
        let mut target = Target::new(name);
        target.deps.extend_from_slice(deps);
        self.actions.push(action);
        self.build.add_target(target)
    }

    /// Run every target in dependency order and return the settled build.
    ///
    /// Only an invalid graph is an error; failing targets are recorded in the
    /// returned build and reflected in its exit code.
    pub fn execute(mut self) -> Result<Build> {
        let order = self.build.topological_order()?;

        for obs in &self.observers {
            obs.on_build_created(&self.build);
        }

        info!(targets = order.len(), "Build started");

        for idx in order {
            let blocked = self.build.targets[idx].deps.iter().any(|&d| {
                matches!(
                    self.build.targets[d].status,
                    ExecutionStatus::Failed | ExecutionStatus::Skipped
                )
            });

            if blocked {
                info!(target_name = %self.build.targets[idx].name, "Skipping target");
                self.build.targets[idx].status = ExecutionStatus::Skipped;
                continue;
            }

            self.build.targets[idx].status = ExecutionStatus::Running;
            for obs in &self.observers {
                obs.on_target_running(&self.build, &self.build.targets[idx]);
            }

            let start = Instant::now();
            let mut summary = BTreeMap::new();
            let result = match self.actions[idx].as_mut() {
                Some(action) => action(&mut summary),
                None => Ok(()),
            };

            let target = &mut self.build.targets[idx];
            target.duration += start.elapsed();
            target.summary.extend(summary);
            target.status = match result {
                Ok(()) => ExecutionStatus::Succeeded,
                Err(e) => {
                    error!("Target {} failed: {:#}", target.name, e);
                    ExecutionStatus::Failed
                }
            };
        }

        let failed = self
            .build
            .targets
            .iter()
            .any(|t| t.status == ExecutionStatus::Failed);
        self.build.exit_code = Some(if failed { 1 } else { 0 });

        info!(exit_code = ?self.build.exit_code, "Build finished");

        for obs in &self.observers {
            obs.on_build_finished(&self.build);
        }

        Ok(self.build)
    }
}

impl Default for BuildEngine {
    fn default() -> Self {
        Self::new()
    }
}
