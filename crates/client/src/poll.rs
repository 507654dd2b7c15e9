//! Bounded polling with an injectable clock

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenFormsConfig;
use crate::error::{OpenFormsError, OpenFormsResult};

/// Source of time for the poll loop
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on.
///
/// Lets tests exercise long polling timeouts without waiting for them.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

/// Cadence and bound of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn from_config(config: &OpenFormsConfig) -> Self {
        Self {
            interval: config.polling_interval,
            timeout: config.polling_timeout,
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Ready,
    Pending(String),
}

/// Status document returned by a submission's status URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatus {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub result: String,

    /// Absent or `null` until processing has settled
    pub error_message: Option<String>,
}

impl SubmissionStatus {
    /// Processing finished successfully and reported no error
    pub fn is_success(&self) -> bool {
        self.status == "done" && self.result == "success"
            && self.error_message.as_deref() == Some("")
    }

    pub fn poll_state(&self) -> PollState {
        if self.is_success() {
            PollState::Ready
        } else {
            PollState::Pending(format!(
                "status='{}' result='{}' errorMessage={:?}",
                self.status, self.result, self.error_message
            ))
        }
    }
}

/// Run `probe` until it reports [`PollState::Ready`].
///
/// The first probe runs immediately, later ones after `settings.interval`.
/// Returns the number of probes made. Once the elapsed time reaches
/// `settings.timeout` after a pending probe, fails with `PollTimeout`; the
/// last sleep is shortened so the final probe lands on the deadline. Errors
/// from `probe` end the loop at once.
pub async fn poll_until<F, Fut>(
    clock: &dyn Clock,
    settings: PollSettings,
    mut probe: F,
) -> OpenFormsResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = OpenFormsResult<PollState>>,
{
    let started = clock.now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match probe().await? {
            PollState::Ready => return Ok(attempts),
            PollState::Pending(reason) => {
                debug!("Not ready yet after attempt {}: {}", attempts, reason);
            }
        }

        let waited = clock.now().saturating_sub(started);
        if waited >= settings.timeout {
            return Err(OpenFormsError::PollTimeout {
                attempts,
                waited_secs: waited.as_secs(),
            });
        }

        clock.sleep(settings.interval.min(settings.timeout - waited)).await;
    }
}
