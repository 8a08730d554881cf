//! # 🛑 graceful-tasks
//!
//! `graceful-tasks` runs a process's long-lived Tokio tasks (HTTP servers,
//! tickers, queue workers, cron jobs, signal listeners) under one lifecycle.
//! When any of them stops, every other one is told to stop, the supervisor
//! waits for all of them, and you get back a single result.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use graceful_tasks::{signals, Context, Runner, SupervisorBuilder, Ticker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let heartbeat = Ticker::new(Duration::from_secs(5), |_ctx| async {
//!         println!("still alive");
//!         Ok(())
//!     });
//!
//!     SupervisorBuilder::new()
//!         .with_task("heartbeat", heartbeat)
//!         .with_runner("signals", Runner::new(signals))
//!         .build()
//!         .wait_context(&Context::new())
//!         .await?; // Ok(()) after SIGINT / SIGTERM / SIGQUIT
//!     Ok(())
//! }
//! ```
//!
//! ## What you get
//!
//! * **One contract**: everything is a [`SupervisedTask`] consuming a [`Context`].
//! * **Fan-in supervision**: the first task to stop cancels the rest, and no
//!   task is ever abandoned while running.
//! * **Deterministic errors**: the first failure in registration order is
//!   reported; shutdown requests and the supervisor's own cancellation are
//!   clean exits.
//! * **Adapters**: [`Server`], [`Ticker`], [`Worker`], [`Cron`] and [`signals`].
//!
//! ## Outcomes
//!
//! | Task returns                       | Supervisor treats it as                     |
//! | ---------------------------------- | ------------------------------------------- |
//! | `Ok(())`                           | clean                                       |
//! | `TaskError::ShutdownRequested`     | clean                                       |
//! | `TaskError::Cancelled(_)`          | clean, unless the caller's context is done  |
//! | `TaskError::Failed { .. }`         | failure; first one by registration wins     |

pub use context::{CancelCause, CancelHandle, Context};
pub use http::{HttpConfig, Server, BIND_HOST};
pub use scheduling::{
    job, Cron, CronScheduler, FnJob, Schedule, ScheduleError, ScheduledJob, Scheduler,
};
pub use signals::{signals, SignalListener};
pub use supervisor::{
    builder::SupervisorBuilder, handle::SupervisorHandle, wait_context, Supervisor,
    SupervisorError,
};
pub use task::{FailureKind, Runner, SupervisedTask, TaskError, TaskResult};
pub use ticker::Ticker;
pub use worker::Worker;

mod context;
mod http;
mod scheduling;
mod signals;
mod supervisor;
mod task;
mod ticker;
mod worker;

pub type TaskName = String;
