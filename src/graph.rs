use crate::error::{HeraldError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Execution state of a target as reported by the build engine
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    #[default]
    NotRun,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    pub status: ExecutionStatus,
    /// Accumulated execution time
    pub duration: Duration,
    /// Free-form summary information published by the target's action
    pub summary: BTreeMap<String, String>,
    /// Indices of targets that must run first
    pub deps: Vec<usize>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ExecutionStatus::NotRun,
            duration: Duration::ZERO,
            summary: BTreeMap::new(),
            deps: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dep: usize) -> Self {
        self.deps.push(dep);
        self
    }
}

/// The live state of one build run, owned by the engine and read by observers
#[derive(Clone, Debug, Default)]
pub struct Build {
    pub targets: Vec<Target>,
    /// Process exit code, only set once the build has finished
    pub exit_code: Option<i32>,
}

impl Build {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target and return its index for use as a dependency
    pub fn add_target(&mut self, target: Target) -> usize {
        self.targets.push(target);
        self.targets.len() - 1
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Target indices ordered so that every dependency precedes its dependents
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let mut marks = vec![Mark::Unvisited; self.targets.len()];
        let mut order = Vec::with_capacity(self.targets.len());

        for i in 0..self.targets.len() {
            self.visit(i, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(&self, node: usize, marks: &mut Vec<Mark>, order: &mut Vec<usize>) -> Result<()> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(HeraldError::Config {
                    reason: format!(
                        "dependency cycle through target '{}'",
                        self.targets[node].name
                    ),
                })
            }
            Mark::Unvisited => {}
        }

        marks[node] = Mark::InProgress;
        for &dep in &self.targets[node].deps {
            if dep >= self.targets.len() {
                return Err(HeraldError::Config {
                    reason: format!(
                        "target '{}' depends on unknown index {}",
                        self.targets[node].name, dep
                    ),
                });
            }
            self.visit(dep, marks, order)?;
        }
        marks[node] = Mark::Done;
        order.push(node);

        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_come_first() {
        let mut build = Build::new();
        let compile = build.add_target(Target::new("Compile"));
        let test = build.add_target(Target::new("Test").depends_on(compile));
        let pack = build.add_target(Target::new("Pack").depends_on(compile));
        build.add_target(Target::new("Publish").depends_on(test).depends_on(pack));

        let order = build.topological_order().unwrap();
        let pos = |name: &str| {
            order
                .iter()
                .position(|&i| build.targets[i].name == name)
                .unwrap()
        };

        assert!(pos("Compile") < pos("Test"));
        assert!(pos("Compile") < pos("Pack"));
        assert!(pos("Test") < pos("Publish"));
        assert!(pos("Pack") < pos("Publish"));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut build = Build::new();
        build.add_target(Target::new("A").depends_on(1));
        build.add_target(Target::new("B").depends_on(0));

        let err = build.topological_order().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
