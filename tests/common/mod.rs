use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use graceful_tasks::{Context, Runner, TaskError};
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines so tests can assert on them.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(unused)]
impl LogBuffer {
    pub fn dispatch(&self) -> Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        Dispatch::new(subscriber)
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(self.0.clone())
    }
}

/// Succeeds after `delay`, ignoring cancellation.
#[allow(unused)]
pub fn completing(delay: Duration) -> Runner {
    Runner::new(move |_ctx: Context| async move {
        tokio::time::sleep(delay).await;
        Ok(())
    })
}

/// Fails with `message` after `delay`, ignoring cancellation.
#[allow(unused)]
pub fn failing(delay: Duration, message: &'static str) -> Runner {
    Runner::new(move |_ctx: Context| async move {
        tokio::time::sleep(delay).await;
        Err(TaskError::failed(anyhow::anyhow!(message)))
    })
}

/// Runs until its context is done and returns the cause.
#[allow(unused)]
pub fn until_cancelled() -> Runner {
    Runner::new(|ctx: Context| async move { Err(TaskError::from(ctx.done().await)) })
}
