use crate::graph::{Build, Target};
use serde::Serialize;

/// Why a status update was sent
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum UpdateReason {
    BuildCreated,
    TargetStarted,
    BuildFinished,
}

/// Hooks invoked by the build engine at fixed points of a single run.
///
/// `on_build_created` fires first and exactly once, `on_target_running` once
/// per target as it starts, `on_build_finished` once after every target has
/// settled. Implementations must not panic: the build outcome is never
/// affected by an observer.
pub trait BuildObserver: Send + Sync {
    fn on_build_created(&self, build: &Build);
    fn on_target_running(&self, build: &Build, target: &Target);
    fn on_build_finished(&self, build: &Build);
}
