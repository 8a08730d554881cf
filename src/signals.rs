//! Termination signal listener.
//!
//! On Unix the listener intercepts **SIGINT**, **SIGTERM** and **SIGQUIT**.
//! SIGKILL cannot be caught and is not handled. On
//! other platforms only Ctrl-C is watched.

use crate::{
    context::Context,
    task::{FailureKind, TaskError, TaskResult},
};

/// Waits for a termination signal or for `ctx` to be done.
///
/// Returns [`TaskError::ShutdownRequested`] when a signal arrives, which a
/// supervisor reduces to a clean exit, or the context's cancellation cause.
/// Signal interest is registered on entry and released on every exit path.
pub async fn signals(ctx: Context) -> TaskResult {
    let mut listener = SignalListener::register()
        .map_err(|err| TaskError::with_kind(FailureKind::Signal, err))?;

    tokio::select! {
        biased;
        cause = ctx.done() => Err(cause.into()),
        signal = listener.recv() => {
            tracing::info!(signal, "received termination signal");
            Err(TaskError::ShutdownRequested)
        }
    }
}

/// Scoped registration of interest in termination signals.
///
/// Dropping the listener deregisters its streams. Tokio keeps its
/// process-wide handler installed afterwards, so a later signal with no
/// listener is ignored rather than terminating the process.
#[cfg(unix)]
pub struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the next signal and returns its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

#[cfg(not(unix))]
pub struct SignalListener {
    _private: (),
}

#[cfg(not(unix))]
impl SignalListener {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self { _private: () })
    }

    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for ctrl-c");
                std::future::pending().await
            }
        }
    }
}
