use std::{future::Future, time::Duration};

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{instrument::WithSubscriber, Dispatch};

use crate::{
    context::Context,
    task::{triage, FailureKind, SupervisedTask, TaskResult, Verdict},
};

/// Runs a sub-task on a fixed interval.
///
/// The sub-task is awaited before the next tick is considered, so calls
/// never overlap; ticks missed while it runs are skipped rather than queued.
/// Failures built with [`TaskError::ticker_fatal`](crate::TaskError::ticker_fatal)
/// stop the ticker, any other failure is logged and the ticker carries on.
pub struct Ticker<F> {
    interval: Duration,
    runner: F,
    logger: Option<Dispatch>,
}

impl<F, Fut> Ticker<F>
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    /// Creates a ticker firing every `interval`, first one interval after start.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn new(interval: Duration, runner: F) -> Self {
        assert!(!interval.is_zero(), "interval must be greater than zero");
        Self {
            interval,
            runner,
            logger: None,
        }
    }

    /// Routes the ticker's logs to `logger` instead of the default dispatcher.
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl<F, Fut> SupervisedTask for Ticker<F>
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn run(self, ctx: Context) -> TaskResult {
        let Self {
            interval,
            mut runner,
            logger,
        } = self;

        let ticking = async move {
            let start = Instant::now()
                .checked_add(interval)
                .unwrap_or_else(far_future);
            let mut ticks = interval_at(start, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(?interval, "starting ticker");
            let result = loop {
                tokio::select! {
                    biased;
                    cause = ctx.done() => break Err(cause.into()),
                    _ = ticks.tick() => {
                        match triage(runner(ctx.clone()).await, FailureKind::TickerFatal) {
                            Verdict::Continue => {}
                            Verdict::Ignore(err) => tracing::error!(error = %err, "runner failed"),
                            Verdict::Stop(err) => break Err(err),
                        }
                    }
                }
            };
            tracing::info!("stopped ticker");
            result
        };

        match logger {
            Some(logger) => ticking.with_subscriber(logger).await,
            None => ticking.await,
        }
    }
}

/// Roughly 30 years from now, for intervals that overflow an instant.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
