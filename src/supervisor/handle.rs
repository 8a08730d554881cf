use tokio::task::JoinHandle;

use crate::{context::CancelHandle, SupervisorError};

/// Handle to a supervisor started with [`Supervisor::run`](crate::Supervisor::run).
#[derive(Debug)]
pub struct SupervisorHandle {
    join_handle: JoinHandle<Result<(), SupervisorError>>,
    stop: CancelHandle,
}

impl SupervisorHandle {
    pub(crate) fn new(
        join_handle: JoinHandle<Result<(), SupervisorError>>,
        stop: CancelHandle,
    ) -> Self {
        Self { join_handle, stop }
    }

    /// Asks every task to stop. The supervisor reports this as a clean exit.
    pub fn shutdown(&self) {
        tracing::info!("supervisor shutdown requested");
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits for every task to stop and returns the reduced outcome.
    pub async fn wait(self) -> Result<(), SupervisorError> {
        self.join_handle.await?
    }
}
