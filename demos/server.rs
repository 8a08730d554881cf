use std::time::Duration;

use axum::{routing::get, Router};
use graceful_tasks::{
    job, signals, Context, Cron, Runner, Server, SupervisorBuilder, TaskError, Ticker, Worker,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let (tx, rx) = mpsc::channel::<u64>(16);

    let router = Router::new().route("/ping", get(|| async { "pong" }));
    let server = Server::new(router).with_port("3000");

    // Feeds the worker every second.
    let mut sequence = 0;
    let producer = Ticker::new(Duration::from_secs(1), move |_ctx| {
        sequence += 1;
        let tx = tx.clone();
        let value = sequence;
        async move {
            tx.send(value)
                .await
                .map_err(|_| TaskError::ticker_fatal(anyhow::anyhow!("worker is gone")))
        }
    });

    let consumer = Worker::new(rx, |_ctx, value: u64| async move {
        if value % 5 == 0 {
            return Err(TaskError::failed(anyhow::anyhow!("skipping {value}")));
        }
        tracing::info!(value, "handled item");
        Ok(())
    });

    let cron = Cron::from_jobs([job("@every 10s", || async {
        tracing::info!("cron job fired");
    })])?;

    SupervisorBuilder::new()
        .with_task("http", server)
        .with_task("producer", producer)
        .with_task("consumer", consumer)
        .with_task("cron", cron)
        .with_runner("signals", Runner::new(signals))
        .build()
        .wait_context(&Context::new())
        .await?;

    tracing::info!("all tasks stopped");
    Ok(())
}
