pub(crate) mod builder;
pub(crate) mod handle;

use std::collections::HashMap;

use anyhow::anyhow;
use tokio::task::JoinSet;

use crate::{
    context::{CancelCause, CancelHandle, Context},
    supervisor::handle::SupervisorHandle,
    task::{FailureKind, Runner, SupervisedTask, TaskError, TaskResult},
    TaskName,
};

/// Error returned by a supervisor once every task has stopped.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The first failing task, in the order tasks were registered.
    #[error("task `{name}` failed: {source}")]
    TaskFailed { name: TaskName, source: TaskError },
    /// The caller's context was cancelled or expired under the tasks.
    #[error("supervision interrupted: {0}")]
    Cancelled(CancelCause),
    /// The spawned supervisor never produced a result.
    #[error("supervisor aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Runs a fixed set of tasks under one shared context.
///
/// All tasks start together. As soon as any of them returns, for any reason,
/// the shared context is cancelled so the others wind down, and the
/// supervisor waits for every task before reducing their outcomes:
///
/// * success, shutdown requests and cancellation caused by the supervisor
///   itself are clean;
/// * otherwise the first failure in registration order wins, regardless of
///   which task finished first, and later failures are logged.
pub struct Supervisor {
    tasks: Vec<(TaskName, Runner)>,
}

impl Supervisor {
    /// Runs every task in place and returns the reduced outcome.
    pub async fn wait_context(self, ctx: &Context) -> Result<(), SupervisorError> {
        let (shared, cancel) = ctx.with_cancel();
        self.supervise(ctx, shared, cancel).await
    }

    /// Spawns the supervisor and returns a handle to stop or await it.
    pub fn run(self, ctx: &Context) -> SupervisorHandle {
        let (shared, cancel) = ctx.with_cancel();
        let parent = ctx.clone();
        let stop = cancel.clone();
        let join_handle =
            tokio::spawn(async move { self.supervise(&parent, shared, cancel).await });
        SupervisorHandle::new(join_handle, stop)
    }

    async fn supervise(
        self,
        parent: &Context,
        shared: Context,
        cancel: CancelHandle,
    ) -> Result<(), SupervisorError> {
        let _cancel_on_exit = cancel.clone().drop_guard();
        if self.tasks.is_empty() {
            return Ok(());
        }

        let mut names = Vec::with_capacity(self.tasks.len());
        let mut indices = HashMap::with_capacity(self.tasks.len());
        let mut set = JoinSet::new();
        for (index, (name, runner)) in self.tasks.into_iter().enumerate() {
            tracing::debug!(task = %name, "starting task");
            let ctx = shared.clone();
            let abort = set.spawn(async move { runner.run(ctx).await });
            indices.insert(abort.id(), index);
            names.push(name);
        }

        let mut outcomes: Vec<Option<TaskResult>> = names.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next_with_id().await {
            cancel.cancel();
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(join_error) => {
                    let id = join_error.id();
                    let outcome = Err(TaskError::with_kind(
                        FailureKind::Panic,
                        anyhow!("{join_error}"),
                    ));
                    (id, outcome)
                }
            };
            if let Some(&index) = indices.get(&id) {
                tracing::debug!(task = %names[index], "task stopped");
                outcomes[index] = Some(outcome);
            }
        }

        reduce(names, outcomes, parent)
    }
}

/// Runs `runners` under a context derived from `ctx` and reduces their
/// outcomes. Tasks are named `runner-<index>` in errors and logs.
pub async fn wait_context(
    ctx: &Context,
    runners: impl IntoIterator<Item = Runner>,
) -> Result<(), SupervisorError> {
    let tasks = runners
        .into_iter()
        .enumerate()
        .map(|(index, runner)| (format!("runner-{index}"), runner))
        .collect();
    Supervisor { tasks }.wait_context(ctx).await
}

fn reduce(
    names: Vec<TaskName>,
    outcomes: Vec<Option<TaskResult>>,
    parent: &Context,
) -> Result<(), SupervisorError> {
    let mut first_failure = None;
    let mut saw_cancellation = false;

    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            Some(Ok(())) | None => {}
            Some(Err(TaskError::ShutdownRequested)) => {
                tracing::info!(task = %name, "shutdown requested");
            }
            Some(Err(TaskError::Cancelled(_))) => saw_cancellation = true,
            Some(Err(source)) => {
                if first_failure.is_none() {
                    first_failure = Some(SupervisorError::TaskFailed { name, source });
                } else {
                    tracing::error!(
                        task = %name,
                        error = %source,
                        "discarding secondary task failure"
                    );
                }
            }
        }
    }

    if let Some(failure) = first_failure {
        return Err(failure);
    }
    match parent.err() {
        Some(cause) if saw_cancellation => Err(SupervisorError::Cancelled(cause)),
        _ => Ok(()),
    }
}
