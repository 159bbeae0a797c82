//! Channel delivery of a run's events

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::WarbandError;
use crate::event::Event;
use crate::orchestrator::{RunTarget, TeamManager};

/// Default buffer between a run task and its receiver
pub const DEFAULT_RUN_CAPACITY: usize = 64;

/// Receiving end of a run spawned with [`TeamManager::run_channel`]
///
/// Dropping the receiver aborts the run task, which in turn cancels every
/// concurrent member still running.
pub struct RunReceiver {
    rx: mpsc::Receiver<Event>,
    task: JoinHandle<()>,
}

impl RunReceiver {
    /// Receive the next event, `None` once the run has ended
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Whether the run task has stopped producing
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for RunReceiver {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RunReceiver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TeamManager {
    /// Spawn a run onto the runtime, buffering up to `capacity` events
    ///
    /// The hierarchy is built before anything is spawned, so graph errors
    /// are returned here rather than delivered on the channel.
    pub async fn run_channel(
        &self,
        message: impl Into<std::sync::Arc<str>>,
        target: impl Into<RunTarget>,
        capacity: usize,
    ) -> Result<RunReceiver, WarbandError> {
        let mut events = self.run_stream(message, target).await?;
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if tx.send(event).await.is_err() {
                    debug!("Run receiver closed");
                    break;
                }
            }
        });

        Ok(RunReceiver { rx, task })
    }
}
