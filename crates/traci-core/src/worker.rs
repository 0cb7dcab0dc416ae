//! Shared access to one simulator connection.
//!
//! [`ClientHandle::spawn`] moves a [`SimClient`] onto its own tokio task.
//! Callers submit descriptors over a channel and each receives its result on a
//! private oneshot. A single-permit semaphore guards the connection: under
//! [`BusyPolicy::Queue`] callers wait their turn, under [`BusyPolicy::Reject`]
//! a caller that finds the connection in use fails with [`ClientError::Busy`].
//!
//! The permit travels with the job and is released only after the worker has
//! read the response, so a caller that stops waiting never lets the next
//! request overtake an outstanding one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, Instrument};

use crate::client::{ClientError, SimClient};
use crate::command::CommandDescriptor;
use crate::config::BusyPolicy;
use crate::protocol::DecodedValue;

/// Every job holds the single permit, so at most one is ever queued.
/// Waiting callers queue on the semaphore instead.
const JOB_QUEUE_DEPTH: usize = 1;

type Reply = Result<DecodedValue, ClientError>;

struct Job {
    cmd: CommandDescriptor,
    reply: oneshot::Sender<Reply>,
    _permit: OwnedSemaphorePermit,
}

/// Handle to a client running on a worker task.
///
/// Share it behind an [`Arc`]; every method takes `&self`.
pub struct ClientHandle {
    jobs: mpsc::Sender<Job>,
    permits: Arc<Semaphore>,
    policy: BusyPolicy,
    cancel_token: CancellationToken,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ClientHandle {
    /// Spawn a worker task that owns `client`.
    pub fn spawn(client: SimClient, policy: BusyPolicy) -> Self {
        let (jobs, rx) = mpsc::channel(JOB_QUEUE_DEPTH);
        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let join_handle = tokio::spawn(async move {
            Self::run_loop(client, rx, token_clone).await;
        });

        Self {
            jobs,
            permits: Arc::new(Semaphore::new(1)),
            policy,
            cancel_token,
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    /// Run `cmd` on the worker and wait for its result.
    pub async fn execute(&self, cmd: CommandDescriptor) -> Reply {
        let rx = self.submit(cmd).await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Like [`execute`](Self::execute), but stop waiting after `wait`.
    ///
    /// A timed-out request still completes on the worker; its response is read
    /// and discarded before the next request is sent.
    pub async fn execute_timeout(&self, cmd: CommandDescriptor, wait: Duration) -> Reply {
        let rx = self.submit(cmd).await?;
        match tokio::time::timeout(wait, rx).await {
            Ok(reply) => reply.map_err(|_| ClientError::Closed)?,
            Err(_) => {
                debug!(?wait, "caller abandoned wait");
                Err(ClientError::Timeout)
            }
        }
    }

    /// Stop the worker and close the client. Pending and later calls fail
    /// with [`ClientError::Closed`].
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.permits.close();
        if let Some(handle) = self.join_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Returns whether the worker task is still accepting jobs.
    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.jobs.is_closed()
    }

    async fn submit(&self, cmd: CommandDescriptor) -> Result<oneshot::Receiver<Reply>, ClientError> {
        if !self.is_running() {
            return Err(ClientError::Closed);
        }
        let permit = match self.policy {
            BusyPolicy::Queue => self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ClientError::Closed)?,
            BusyPolicy::Reject => match self.permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => {
                    debug!(command = cmd.name(), "rejecting request, connection busy");
                    return Err(ClientError::Busy);
                }
                Err(TryAcquireError::Closed) => return Err(ClientError::Closed),
            },
        };

        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job {
                cmd,
                reply,
                _permit: permit,
            })
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(rx)
    }

    async fn run_loop(mut client: SimClient, mut rx: mpsc::Receiver<Job>, cancel_token: CancellationToken) {
        loop {
            let job = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let span = debug_span!("worker_job", command = job.cmd.name());
            let result = async {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => None,
                    result = client.execute(&job.cmd) => Some(result),
                }
            }
            .instrument(span)
            .await;

            match result {
                Some(result) => {
                    if job.reply.send(result).is_err() {
                        trace!("caller went away before the reply");
                    }
                }
                None => {
                    let _ = job.reply.send(Err(ClientError::Closed));
                    break;
                }
            }
        }

        rx.close();
        while let Some(job) = rx.recv().await {
            let _ = job.reply.send(Err(ClientError::Closed));
        }
        client.close();
        debug!("client worker stopped");
    }
}
