use std::{fmt, future::Future, pin::Pin};

use crate::context::{CancelCause, Context};

pub type TaskResult = Result<(), TaskError>;

/// Classification carried by every task failure.
///
/// Adapters that keep running across failures (tickers, workers) only stop
/// on the kind they treat as fatal and log everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Task,
    TickerFatal,
    WorkerFatal,
    Server,
    Signal,
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task failure"),
            Self::TickerFatal => write!(f, "ticker failure"),
            Self::WorkerFatal => write!(f, "worker failure"),
            Self::Server => write!(f, "server failure"),
            Self::Signal => write!(f, "signal failure"),
            Self::Panic => write!(f, "task panicked"),
        }
    }
}

/// Terminal outcome of a task that did not simply succeed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task's context was cancelled or expired.
    #[error(transparent)]
    Cancelled(#[from] CancelCause),
    /// Someone asked for the whole process to stop. Supervisors treat this
    /// as a clean exit.
    #[error("shutdown requested")]
    ShutdownRequested,
    #[error("{kind}: {source:#}")]
    Failed {
        kind: FailureKind,
        source: anyhow::Error,
    },
}

impl TaskError {
    pub fn with_kind(kind: FailureKind, source: impl Into<anyhow::Error>) -> Self {
        Self::Failed {
            kind,
            source: source.into(),
        }
    }

    /// An ordinary failure. Tickers and workers log it and carry on.
    pub fn failed(source: impl Into<anyhow::Error>) -> Self {
        Self::with_kind(FailureKind::Task, source)
    }

    /// A failure that stops a [`Ticker`](crate::Ticker).
    pub fn ticker_fatal(source: impl Into<anyhow::Error>) -> Self {
        Self::with_kind(FailureKind::TickerFatal, source)
    }

    /// A failure that stops a [`Worker`](crate::Worker).
    pub fn worker_fatal(source: impl Into<anyhow::Error>) -> Self {
        Self::with_kind(FailureKind::WorkerFatal, source)
    }

    /// The failure kind, or `None` for cancellation and shutdown requests.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn is_shutdown_requested(&self) -> bool {
        matches!(self, Self::ShutdownRequested)
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(source: anyhow::Error) -> Self {
        Self::failed(source)
    }
}

/// What a repeating adapter does with one sub-task result.
pub(crate) enum Verdict {
    Continue,
    /// The sub-task failed with a kind the adapter does not treat as fatal.
    Ignore(TaskError),
    Stop(TaskError),
}

/// Sorts a sub-task result into continue, log-and-continue or stop, given
/// the failure kind the calling adapter treats as fatal.
pub(crate) fn triage(result: TaskResult, fatal: FailureKind) -> Verdict {
    match result {
        Ok(()) | Err(TaskError::Cancelled(_)) => Verdict::Continue,
        Err(err @ TaskError::ShutdownRequested) => Verdict::Stop(err),
        Err(err) if err.kind() == Some(fatal) => Verdict::Stop(err),
        Err(err) => Verdict::Ignore(err),
    }
}

/// The trait implemented by everything a supervisor can run.
///
/// A task is consumed by [`run`](SupervisedTask::run): it runs until it
/// completes, fails, or observes that `ctx` is done, and it is never
/// restarted. Build a new value to run the same work again.
///
/// # Example
///
/// ```rust
/// use graceful_tasks::{Context, SupervisedTask, TaskResult};
///
/// struct WaitForStop;
///
/// impl SupervisedTask for WaitForStop {
///     async fn run(self, ctx: Context) -> TaskResult {
///         Err(ctx.done().await.into())
///     }
/// }
/// ```
pub trait SupervisedTask: Send + 'static {
    /// Runs the task to completion.
    ///
    /// Every wait inside the task must also watch `ctx`, so that the
    /// supervisor can wind it down promptly.
    fn run(self, ctx: Context) -> impl Future<Output = TaskResult> + Send;
}

type BoxedRun = Box<dyn FnOnce(Context) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> + Send>;

/// A type-erased, one-shot task.
pub struct Runner {
    run: BoxedRun,
}

impl Runner {
    /// Wraps an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    pub fn from_task<T: SupervisedTask>(task: T) -> Self {
        Self::new(move |ctx| task.run(ctx))
    }
}

impl SupervisedTask for Runner {
    fn run(self, ctx: Context) -> impl Future<Output = TaskResult> + Send {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner").finish_non_exhaustive()
    }
}
