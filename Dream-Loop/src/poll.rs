use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Transport;
use crate::error::{DreamError, Result};
use crate::extract::extract;
use crate::types::{GenerationResult, GenerationStatus, HistoryEntry, QueuePosition};

/// Wait/timeout policy for [`await_result`].
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Hard ceiling on the whole wait. Never retried.
    pub max_wait: Duration,
    /// Pause between polls. Must be non-zero.
    pub poll_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl PollConfig {
    pub fn new(max_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            max_wait,
            poll_interval,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(DreamError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// What one poll saw.
#[derive(Debug)]
enum Observation {
    Completed(HistoryEntry),
    Errored(Vec<String>),
    Queued(QueuePosition),
    /// Neither in history nor in the queue.
    Unseen,
}

async fn poll_once<T: Transport + ?Sized>(transport: &T, job_id: &str) -> Result<Observation> {
    if let Some(entry) = transport.history(job_id).await? {
        if entry.status.completed {
            return Ok(Observation::Completed(entry));
        }
        if entry.is_error() {
            return Ok(Observation::Errored(entry.status.messages));
        }
    }

    let queue = transport.queue_state().await?;
    Ok(match queue.position(job_id) {
        Some(position) => Observation::Queued(position),
        None => Observation::Unseen,
    })
}

/// `Pending -> Processing -> {Completed, Failed}`. Never moves backwards.
#[derive(Debug)]
struct JobTracker<'a> {
    job_id: &'a str,
    api_base: &'a str,
    max_wait: Duration,
    status: GenerationStatus,
}

impl<'a> JobTracker<'a> {
    fn new(job_id: &'a str, api_base: &'a str, max_wait: Duration) -> Self {
        Self {
            job_id,
            api_base,
            max_wait,
            status: GenerationStatus::Pending,
        }
    }

    /// Remaining-time fraction of the wait, as a percentage. This is a
    /// wall-clock proxy, not model progress, and ignores queue position.
    fn progress(&self, elapsed: Duration) -> f64 {
        let max = self.max_wait.as_secs_f64();
        if max <= 0.0 {
            return 0.0;
        }
        ((max - elapsed.as_secs_f64()) / max * 100.0).clamp(0.0, 100.0)
    }

    fn current(&self, elapsed: Duration) -> GenerationResult {
        match self.status {
            GenerationStatus::Processing => {
                GenerationResult::processing(self.job_id, self.progress(elapsed))
            }
            _ => GenerationResult::pending(self.job_id),
        }
    }

    /// Fold one poll into the state and return a fresh snapshot.
    fn apply(&mut self, observation: Result<Observation>, elapsed: Duration) -> GenerationResult {
        match observation {
            Ok(Observation::Completed(entry)) => {
                self.status = GenerationStatus::Completed;
                let media = extract(self.api_base, &entry.outputs);
                if media.media_url.is_none() {
                    warn!(job_id = self.job_id, "Job completed without animated output");
                }
                GenerationResult::completed(self.job_id, media.media_url, media.auxiliary_media)
            }
            Ok(Observation::Errored(messages)) => {
                self.status = GenerationStatus::Failed;
                let error = if messages.is_empty() {
                    "Generation failed".to_string()
                } else {
                    messages.join(", ")
                };
                GenerationResult::failed(self.job_id, error)
            }
            Ok(Observation::Queued(position)) => {
                debug!(job_id = self.job_id, ?position, "Job found in queue");
                self.status = self.status.max(GenerationStatus::Processing);
                self.current(elapsed)
            }
            Ok(Observation::Unseen) => self.current(elapsed),
            Err(e) => {
                if e.is_transient() {
                    warn!(job_id = self.job_id, error = %e, "Poll failed, will retry");
                } else {
                    warn!(job_id = self.job_id, error = %e, "Backend rejected poll, will retry");
                }
                self.current(elapsed)
            }
        }
    }
}

/// How a [`poll_until`] run ended.
#[derive(Debug)]
pub(crate) enum PollOutcome {
    Finished(GenerationResult),
    TimedOut,
    Cancelled,
}

/// Call `poll` every `config.poll_interval` and hand each answer to `handle`
/// until `handle` returns a terminal result, `cancel` fires, or
/// `config.max_wait` passes.
///
/// The deadline also bounds in-flight polls: a call still running when it
/// passes is dropped. Returns the outcome and the number of polls started.
/// Callers check [`PollConfig::validate`] first.
pub(crate) async fn poll_until<P, Fut, R, H>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut poll: P,
    mut handle: H,
) -> (PollOutcome, u32)
where
    P: FnMut() -> Fut,
    Fut: std::future::Future<Output = R>,
    H: FnMut(R, Duration) -> Option<GenerationResult>,
{
    let start = Instant::now();
    let deadline = start + config.max_wait;
    let mut polls: u32 = 0;

    while Instant::now() < deadline {
        polls += 1;
        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (PollOutcome::Cancelled, polls),
            _ = tokio::time::sleep_until(deadline) => return (PollOutcome::TimedOut, polls),
            answer = poll() => answer,
        };

        if let Some(result) = handle(answer, start.elapsed()) {
            return (PollOutcome::Finished(result), polls);
        }

        let next = (Instant::now() + config.poll_interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return (PollOutcome::Cancelled, polls),
            _ = tokio::time::sleep_until(next) => {}
        }
    }

    (PollOutcome::TimedOut, polls)
}

/// Poll `transport` until `job_id` completes, fails, the deadline passes,
/// or `cancel` fires.
///
/// Always resolves to a [`GenerationResult`]. Transport errors during a poll
/// are logged and the loop keeps going. A poll still in flight at the
/// deadline is abandoned. Every non-terminal poll hands a fresh snapshot to
/// `on_update`. Cancellation stops polling but leaves the remote job alone.
pub async fn await_result<T, F>(
    transport: &T,
    job_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_update: F,
) -> GenerationResult
where
    T: Transport + ?Sized,
    F: FnMut(&GenerationResult) + Send,
{
    if let Err(e) = config.validate() {
        return GenerationResult::failed(job_id, e.to_string());
    }

    let mut tracker = JobTracker::new(job_id, transport.api_base(), config.max_wait);
    let (outcome, polls) = poll_until(
        config,
        cancel,
        move || poll_once(transport, job_id),
        |observation, elapsed| {
            let snapshot = tracker.apply(observation, elapsed);
            if snapshot.status.is_terminal() {
                return Some(snapshot);
            }
            on_update(&snapshot);
            None
        },
    )
    .await;

    match outcome {
        PollOutcome::Finished(result) => {
            info!(job_id, polls, status = ?result.status, "Generation finished");
            result
        }
        PollOutcome::TimedOut => {
            warn!(job_id, polls, "Generation timed out");
            GenerationResult::failed(job_id, DreamError::Timeout.to_string())
        }
        PollOutcome::Cancelled => {
            info!(job_id, polls, "Stopped waiting for generation");
            GenerationResult::failed(job_id, DreamError::Cancelled.to_string())
        }
    }
}
