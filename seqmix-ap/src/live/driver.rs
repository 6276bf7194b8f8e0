//! Scheduler driver
//!
//! Runs a [`LiveScheduler`] on its own tokio task. Callers talk to it through
//! a [`SchedulerHandle`]: commands go over an `mpsc` channel and each one
//! replies on a `oneshot`. Between commands the task sleeps until the next
//! armed continuation and then fires everything due. A `watch` channel
//! carries the latest [`SchedulerStatus`]; events go out on the scheduler's
//! `EventBus`.
//!
//! Scheduler logic only ever runs on this one task, so no locking is needed
//! around scheduler state.

use crate::error::{Error, Result};
use crate::live::graph::AudioGraph;
use crate::live::scheduler::LiveScheduler;
use crate::mix::assets::AssetFetcher;
use seqmix_common::events::{EventBus, SchedulerStatus, SeqmixEvent, SurveyResponse};
use seqmix_common::time::seconds_to_duration;
use seqmix_common::UploadBinding;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Command channel depth
const COMMAND_CAPACITY: usize = 32;

/// Shortest sleep before re-checking an armed continuation
///
/// Keeps the loop from spinning when the graph clock lags wall time.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Commands accepted by the driver
#[derive(Debug)]
pub enum Command {
    Load {
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    Skip {
        reply: oneshot::Sender<Result<()>>,
    },
    AnswerSurvey {
        answer: String,
        reply: oneshot::Sender<Result<SurveyResponse>>,
    },
    BindUpload {
        binding: UploadBinding,
        reply: oneshot::Sender<()>,
    },
    Diagnostics {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown,
}

/// Client side of a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<SchedulerStatus>,
    events: Arc<EventBus>,
}

/// Move `scheduler` onto a new task
///
/// # Returns
/// The handle, and the task's join handle which yields the scheduler back
/// after shutdown.
pub fn spawn_scheduler<G>(
    scheduler: LiveScheduler<G>,
    fetcher: AssetFetcher,
) -> (SchedulerHandle, JoinHandle<LiveScheduler<G>>)
where
    G: AudioGraph + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (status_tx, status_rx) = watch::channel(scheduler.status());
    let events = Arc::clone(scheduler.events());

    let task = tokio::spawn(run(scheduler, fetcher, rx, status_tx));

    (
        SchedulerHandle {
            tx,
            status: status_rx,
            events,
        },
        task,
    )
}

async fn run<G: AudioGraph>(
    mut scheduler: LiveScheduler<G>,
    fetcher: AssetFetcher,
    mut rx: mpsc::Receiver<Command>,
    status_tx: watch::Sender<SchedulerStatus>,
) -> LiveScheduler<G> {
    info!("Scheduler driver started");

    loop {
        let wait = scheduler.next_deadline().map(|due| {
            let remaining = due - scheduler.graph().current_time();
            seconds_to_duration(remaining).max(MIN_WAIT)
        });

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("All scheduler handles dropped");
                    break;
                };
                if !handle_command(&mut scheduler, &fetcher, command).await {
                    break;
                }
            }
            _ = sleep_for(wait) => {
                let fired = scheduler.run_due();
                if fired > 0 {
                    debug!("Fired {} continuations", fired);
                }
            }
        }

        status_tx.send_replace(scheduler.status());
    }

    // Nothing should keep sounding once the driver is gone
    let _ = scheduler.stop();
    status_tx.send_replace(scheduler.status());
    info!("Scheduler driver stopped");
    scheduler
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Apply one command; returns false on shutdown
async fn handle_command<G: AudioGraph>(
    scheduler: &mut LiveScheduler<G>,
    fetcher: &AssetFetcher,
    command: Command,
) -> bool {
    // A dropped reply receiver just means the caller stopped waiting
    match command {
        Command::Load { reply } => {
            let _ = reply.send(scheduler.load(fetcher).await);
        }
        Command::Play { reply } => {
            let _ = reply.send(scheduler.play());
        }
        Command::Stop { reply } => {
            let _ = reply.send(scheduler.stop());
        }
        Command::Skip { reply } => {
            let _ = reply.send(scheduler.skip());
        }
        Command::AnswerSurvey { answer, reply } => {
            let _ = reply.send(scheduler.answer_survey(&answer));
        }
        Command::BindUpload { binding, reply } => {
            scheduler.bind_upload(binding);
            let _ = reply.send(());
        }
        Command::Diagnostics { reply } => {
            let _ = reply.send(scheduler.diagnostics());
        }
        Command::Shutdown => return false,
    }
    true
}

impl SchedulerHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::InvalidState("scheduler is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::InvalidState("scheduler stopped before replying".to_string()))
    }

    /// Resolve and decode every source of the template
    pub async fn load(&self) -> Result<()> {
        self.request(|reply| Command::Load { reply }).await?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply }).await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(|reply| Command::Skip { reply }).await?
    }

    pub async fn answer_survey(&self, answer: impl Into<String>) -> Result<SurveyResponse> {
        let answer = answer.into();
        self.request(|reply| Command::AnswerSurvey { answer, reply })
            .await?
    }

    pub async fn bind_upload(&self, binding: UploadBinding) -> Result<()> {
        self.request(|reply| Command::BindUpload { binding, reply })
            .await
    }

    /// Diagnostic log lines, oldest first
    pub async fn diagnostics(&self) -> Result<Vec<String>> {
        self.request(|reply| Command::Diagnostics { reply }).await
    }

    /// Ask the driver to stop; it halts playback before exiting
    pub async fn shutdown(&self) {
        // Already gone is fine
        let _ = self.tx.send(Command::Shutdown).await;
    }

    /// Latest published status
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that wakes on every status change
    pub fn watch_status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Subscribe to scheduler events
    pub fn subscribe(&self) -> broadcast::Receiver<SeqmixEvent> {
        self.events.subscribe()
    }
}
