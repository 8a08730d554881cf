mod schedule;
mod scheduler;

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

pub use schedule::{Schedule, ScheduleError};
pub use scheduler::{CronScheduler, Scheduler};

use crate::{
    context::Context,
    task::{SupervisedTask, TaskResult},
};

/// A job fired by a [`Scheduler`].
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    /// The schedule expression, see [`Schedule`] for the accepted syntax.
    fn spec(&self) -> &str;

    async fn run(&self);
}

/// A [`ScheduledJob`] built from a spec and an async closure.
pub struct FnJob<F> {
    spec: String,
    f: F,
}

/// Builds a job running `f` on `spec`.
pub fn job<F, Fut>(spec: impl Into<String>, f: F) -> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnJob {
        spec: spec.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> ScheduledJob for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn spec(&self) -> &str {
        &self.spec
    }

    async fn run(&self) {
        (self.f)().await
    }
}

/// Drives scheduled jobs for as long as its context is alive.
///
/// Jobs are registered up front, so a malformed spec is reported when the
/// `Cron` is built, not while it runs. Running it starts the scheduler,
/// and once the context is done the scheduler is stopped and the
/// cancellation cause returned.
pub struct Cron<S = CronScheduler> {
    scheduler: S,
}

impl Cron {
    pub fn new() -> Self {
        Self::with_scheduler(CronScheduler::new())
    }

    /// Registers every job on the default scheduler.
    pub fn from_jobs<I, J>(jobs: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = J>,
        J: ScheduledJob,
    {
        jobs.into_iter().try_fold(Self::new(), |cron, job| cron.with_job(job))
    }
}

impl Default for Cron {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scheduler> Cron<S> {
    pub fn with_scheduler(scheduler: S) -> Self {
        Self { scheduler }
    }

    pub fn with_job(mut self, job: impl ScheduledJob) -> Result<Self, ScheduleError> {
        self.scheduler.add(Arc::new(job))?;
        Ok(self)
    }
}

impl<S: Scheduler> SupervisedTask for Cron<S> {
    async fn run(mut self, ctx: Context) -> TaskResult {
        let _running = Running::start(&mut self.scheduler);
        tracing::info!("started scheduler");
        let cause = ctx.done().await;
        tracing::info!("stopping scheduler");
        Err(cause.into())
    }
}

/// Stops the scheduler when dropped, whichever way the run ends.
struct Running<'a, S: Scheduler>(&'a mut S);

impl<'a, S: Scheduler> Running<'a, S> {
    fn start(scheduler: &'a mut S) -> Self {
        scheduler.start();
        Self(scheduler)
    }
}

impl<S: Scheduler> Drop for Running<'_, S> {
    fn drop(&mut self) {
        self.0.stop();
    }
}
