use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::scheduling::{Schedule, ScheduleError, ScheduledJob};

/// Decides when registered jobs run.
///
/// [`Cron`](crate::Cron) only registers jobs, starts the scheduler and
/// stops it again; the timing itself is up to the implementation.
pub trait Scheduler: Send + 'static {
    /// Registers a job. Fails if the job's spec cannot be parsed.
    fn add(&mut self, job: Arc<dyn ScheduledJob>) -> Result<(), ScheduleError>;

    /// Starts firing jobs. Called from within a Tokio runtime.
    fn start(&mut self);

    /// Stops firing jobs. A job that is already running is left to finish.
    fn stop(&mut self);
}

/// Default [`Scheduler`] running each job in its own Tokio task.
///
/// A job never overlaps with itself: the next firing is computed once the
/// previous run has returned.
#[derive(Default)]
pub struct CronScheduler {
    entries: Vec<(Schedule, Arc<dyn ScheduledJob>)>,
    running: Option<CancellationToken>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Scheduler for CronScheduler {
    fn add(&mut self, job: Arc<dyn ScheduledJob>) -> Result<(), ScheduleError> {
        let schedule = job.spec().parse::<Schedule>()?;
        self.entries.push((schedule, job));
        Ok(())
    }

    fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let token = CancellationToken::new();
        for (schedule, job) in &self.entries {
            tokio::spawn(fire(schedule.clone(), Arc::clone(job), token.clone()));
        }
        self.running = Some(token);
    }

    fn stop(&mut self) {
        if let Some(token) = self.running.take() {
            token.cancel();
        }
    }
}

async fn fire(schedule: Schedule, job: Arc<dyn ScheduledJob>, token: CancellationToken) {
    while let Some(delay) = schedule.next_delay() {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        tracing::debug!(spec = job.spec(), "running scheduled job");
        job.run().await;
    }
    tracing::debug!(spec = job.spec(), "schedule exhausted");
}
