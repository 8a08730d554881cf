use crate::{
    task::{Runner, SupervisedTask},
    Supervisor, TaskName,
};

/// Builds a [`Supervisor`] from named tasks.
///
/// Registration order matters: when several tasks fail, the one registered
/// first is reported.
#[derive(Debug, Default)]
pub struct SupervisorBuilder {
    tasks: Vec<(TaskName, Runner)>,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task under the given name.
    pub fn with_task(self, name: &str, task: impl SupervisedTask) -> Self {
        self.with_runner(name, Runner::from_task(task))
    }

    /// Adds an already boxed task under the given name.
    pub fn with_runner(mut self, name: &str, runner: Runner) -> Self {
        self.tasks.push((name.into(), runner));
        self
    }

    pub fn build(self) -> Supervisor {
        Supervisor { tasks: self.tasks }
    }
}
