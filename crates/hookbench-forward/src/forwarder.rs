//! Background forwarding of logged callbacks.
//!
//! The request handler hands a `ForwardJob` to the `Forwarder` and returns
//! immediately. A single worker task drains the channel and delivers each
//! job in its own task, then records the outcome on the log record.

use std::sync::Arc;

use hookbench_core::{FormData, LogId, LogStore};
use http::{HeaderMap, Method};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, warn};

use crate::{client::ForwardClient, error::Result};

/// A logged request waiting to be forwarded.
#[derive(Debug, Clone)]
pub struct ForwardJob {
    /// Record that receives the outcome.
    pub log_id: LogId,
    /// Method of the original request.
    pub method: Method,
    /// Headers of the original request.
    pub headers: HeaderMap,
    /// Decoded request body.
    pub form: FormData,
}

/// Handle for scheduling forwarding jobs.
///
/// Cheap to clone. The worker keeps running while any handle is alive and
/// finishes in-flight deliveries after the last one is dropped.
#[derive(Debug, Clone)]
pub struct Forwarder {
    sender: mpsc::UnboundedSender<ForwardJob>,
    destination: Arc<str>,
}

impl Forwarder {
    /// Starts the forwarding worker.
    ///
    /// Returns the scheduling handle and the worker's join handle. Awaiting
    /// the join handle after dropping every `Forwarder` waits for pending
    /// deliveries to finish.
    pub fn spawn(
        client: ForwardClient,
        store: Arc<dyn LogStore>,
        destination: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let destination: Arc<str> = Arc::from(destination.into());
        let (sender, receiver) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run(receiver, Arc::new(client), store, destination.clone()));
        info!(destination = %destination, "Forwarder started");

        (Self { sender, destination }, worker)
    }

    /// Queues a job for delivery.
    ///
    /// Never blocks and never reports the delivery result.
    pub fn schedule(&self, job: ForwardJob) {
        let log_id = job.log_id;
        if self.sender.send(job).is_err() {
            warn!(log_id = %log_id, "Forwarder worker has stopped, dropping job");
        }
    }

    /// Destination every job is sent to.
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

async fn run(
    mut receiver: mpsc::UnboundedReceiver<ForwardJob>,
    client: Arc<ForwardClient>,
    store: Arc<dyn LogStore>,
    destination: Arc<str>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    in_flight.spawn(deliver_and_record(
                        job,
                        client.clone(),
                        store.clone(),
                        destination.clone(),
                    ));
                },
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("Forward task failed: {}", e);
                }
            },
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Forward task failed: {}", e);
        }
    }
    debug!("Forwarder worker stopped");
}

async fn deliver_and_record(
    job: ForwardJob,
    client: Arc<ForwardClient>,
    store: Arc<dyn LogStore>,
    destination: Arc<str>,
) {
    let result = client.deliver(&job.method, &job.headers, &job.form, &destination).await;
    let outcome = outcome_text(&result);

    match &result {
        Ok(status) => info!(log_id = %job.log_id, status, "Callback forwarded"),
        Err(e) => warn!(log_id = %job.log_id, error = %e, "Callback forwarding failed"),
    }

    if let Err(e) = store.append_outcome(job.log_id, outcome).await {
        error!(log_id = %job.log_id, error = %e, "Failed to record forward outcome");
    }
}

/// Renders a delivery result as the line appended to a log record.
pub fn outcome_text(result: &Result<u16>) -> String {
    match result {
        Ok(status) => format!("forward_status={status}"),
        Err(e) => e.outcome_text(),
    }
}
