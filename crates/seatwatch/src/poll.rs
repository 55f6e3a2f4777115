//! Owned polling timers.
//!
//! A [`Poller`] re-runs a fetch on a fixed cadence for as long as its handle is
//! alive and publishes the outcome through a `watch` channel. Dropping the
//! handle stops the timer and cancels any request still in flight, so a view
//! that goes away can never receive a late update.
//!
//! Overlapping fetches are allowed. Each one is tagged with a sequence number
//! and a response is only applied if nothing issued after it has already been
//! applied.

use crate::api::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Refresh cadences offered by the views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RefreshInterval {
    TenSeconds,
    #[default]
    ThirtySeconds,
    OneMinute,
    FourMinutes,
    FiveMinutes,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 5] = [
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::OneMinute,
        RefreshInterval::FourMinutes,
        RefreshInterval::FiveMinutes,
    ];

    pub fn as_millis(self) -> u64 {
        match self {
            RefreshInterval::TenSeconds => 10_000,
            RefreshInterval::ThirtySeconds => 30_000,
            RefreshInterval::OneMinute => 60_000,
            RefreshInterval::FourMinutes => 240_000,
            RefreshInterval::FiveMinutes => 300_000,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }

    /// Returns the preset with exactly this period, if any.
    pub fn from_millis(ms: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.as_millis() == ms)
    }

    pub fn label(self) -> &'static str {
        match self {
            RefreshInterval::TenSeconds => "10s",
            RefreshInterval::ThirtySeconds => "30s",
            RefreshInterval::OneMinute => "1m",
            RefreshInterval::FourMinutes => "4m",
            RefreshInterval::FiveMinutes => "5m",
        }
    }
}

impl From<RefreshInterval> for Duration {
    fn from(value: RefreshInterval) -> Self {
        value.duration()
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown refresh interval '{0}' (expected one of 10s, 30s, 1m, 4m, 5m)")]
pub struct UnknownInterval(pub String);

impl FromStr for RefreshInterval {
    type Err = UnknownInterval;

    /// Accepts labels (`30s`, `1m`), seconds (`240s`) or raw milliseconds
    /// (`30000`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let millis = if let Some(mins) = raw.strip_suffix('m') {
            mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60_000))
        } else if let Some(secs) = raw.strip_suffix('s') {
            secs.parse::<u64>().ok().and_then(|s| s.checked_mul(1_000))
        } else {
            raw.parse::<u64>().ok()
        };

        millis
            .and_then(Self::from_millis)
            .ok_or_else(|| UnknownInterval(s.to_string()))
    }
}

impl TryFrom<String> for RefreshInterval {
    type Error = UnknownInterval;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RefreshInterval> for String {
    fn from(value: RefreshInterval) -> Self {
        value.label().to_string()
    }
}

/// Shortest period a poller accepts. Shorter periods, zero included, are
/// raised to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

fn checked_period(name: &'static str, period: Duration) -> Duration {
    if period < MIN_PERIOD {
        warn!(
            poller = name,
            period_ms = period.as_millis() as u64,
            "Poll period too short, using the minimum"
        );
        return MIN_PERIOD;
    }
    period
}

/// Latest outcome of a poller, as seen by its view.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    /// Last successfully fetched value. Kept when a later fetch fails.
    pub data: Option<T>,
    /// Error of the most recently applied fetch, cleared on success
    pub error: Option<ApiError>,
    /// Sequence number of the fetch whose outcome is shown (0 = none yet)
    pub seq: u64,
    pub updated_at: Option<DateTime<Utc>>,
    /// True while at least one fetch is in flight
    pub fetching: bool,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            seq: 0,
            updated_at: None,
            fetching: false,
        }
    }
}

impl<T> PollState<T> {
    /// True until the first fetch has resolved either way.
    pub fn is_loading(&self) -> bool {
        self.seq == 0
    }
}

enum Command {
    RefreshNow,
    SetInterval(Duration),
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct Poller<T> {
    name: &'static str,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PollState<T>>,
    period: Duration,
    task: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Send + Sync + 'static,
{
    /// Starts polling. The first fetch runs immediately, then every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: impl Into<Duration>, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let period = checked_period(name, period.into());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(PollState::default());

        let poll_loop = PollLoop {
            name,
            fetch: Arc::new(fetch),
            state: state_tx,
            in_flight: JoinSet::new(),
            issued: 0,
            applied: 0,
        };
        let task = tokio::spawn(poll_loop.run(period, command_rx));

        debug!(poller = name, period_ms = period.as_millis() as u64, "Poller started");

        Self {
            name,
            commands,
            state,
            period,
            task,
        }
    }

    /// Runs the fetch now. The cadence is left untouched.
    pub fn refresh_now(&self) {
        let _ = self.commands.send(Command::RefreshNow);
    }

    /// Cancels the current timer and starts a new one at `period`. The next
    /// tick is one full `period` from now.
    pub fn set_interval(&mut self, period: impl Into<Duration>) {
        let period = checked_period(self.name, period.into());
        if period == self.period {
            return;
        }
        self.period = period;
        let _ = self.commands.send(Command::SetInterval(period));
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state.clone()
    }

    /// Waits for the next state change.
    ///
    /// Returns `false` if the poll loop has gone away.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Stops the timer and cancels in-flight requests.
    pub fn stop(self) {
        drop(self);
    }
}

impl<T: Clone> Poller<T> {
    /// Snapshot of the current state.
    pub fn state(&self) -> PollState<T> {
        self.state.borrow().clone()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct PollLoop<T, F> {
    name: &'static str,
    fetch: Arc<F>,
    state: watch::Sender<PollState<T>>,
    in_flight: JoinSet<(u64, Result<T, ApiError>)>,
    issued: u64,
    applied: u64,
}

fn ticker(period: Duration, start: Instant) -> Interval {
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl<T, F, Fut> PollLoop<T, F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    async fn run(mut self, period: Duration, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut timer = ticker(period, Instant::now());

        loop {
            tokio::select! {
                _ = timer.tick() => self.start_fetch(),
                command = commands.recv() => match command {
                    Some(Command::RefreshNow) => self.start_fetch(),
                    Some(Command::SetInterval(period)) => {
                        debug!(
                            poller = self.name,
                            period_ms = period.as_millis() as u64,
                            "Restarting timer"
                        );
                        timer = ticker(period, Instant::now() + period);
                    }
                    None => break,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok((seq, result)) => self.apply(seq, result),
                        Err(e) => {
                            warn!(poller = self.name, error = %e, "Fetch task did not complete");
                            let fetching = !self.in_flight.is_empty();
                            self.state.send_modify(|s| s.fetching = fetching);
                        }
                    }
                }
            }
        }
    }

    fn start_fetch(&mut self) {
        self.issued += 1;
        let seq = self.issued;
        let fetch = Arc::clone(&self.fetch);
        self.in_flight.spawn(async move { (seq, fetch().await) });
        self.state.send_modify(|s| s.fetching = true);
        debug!(poller = self.name, seq, "Fetch issued");
    }

    fn apply(&mut self, seq: u64, result: Result<T, ApiError>) {
        let fetching = !self.in_flight.is_empty();

        if seq < self.applied {
            debug!(
                poller = self.name,
                seq,
                applied = self.applied,
                "Discarding response older than the one shown"
            );
            self.state.send_modify(|s| s.fetching = fetching);
            return;
        }
        self.applied = seq;

        if let Err(e) = &result {
            warn!(poller = self.name, seq, error = %e, "Fetch failed");
        }

        self.state.send_modify(|s| {
            match result {
                Ok(data) => {
                    s.data = Some(data);
                    s.error = None;
                }
                Err(e) => s.error = Some(e),
            }
            s.seq = seq;
            s.updated_at = Some(Utc::now());
            s.fetching = fetching;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_fetch(
        counter: Arc<AtomicU64>,
    ) -> impl Fn() -> std::future::Ready<Result<u64, ApiError>> + Send + Sync + 'static {
        move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[test]
    fn test_interval_presets() {
        assert_eq!("10s".parse::<RefreshInterval>(), Ok(RefreshInterval::TenSeconds));
        assert_eq!("1m".parse::<RefreshInterval>(), Ok(RefreshInterval::OneMinute));
        assert_eq!("240s".parse::<RefreshInterval>(), Ok(RefreshInterval::FourMinutes));
        assert_eq!("300000".parse::<RefreshInterval>(), Ok(RefreshInterval::FiveMinutes));
        assert!("45s".parse::<RefreshInterval>().is_err());
        assert_eq!(
            "999999999999999999m".parse::<RefreshInterval>(),
            Err(UnknownInterval("999999999999999999m".to_string()))
        );
        assert!("18446744073709552s".parse::<RefreshInterval>().is_err());
        assert_eq!(RefreshInterval::from_millis(30_000), Some(RefreshInterval::ThirtySeconds));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_cadence() {
        let counter = Arc::new(AtomicU64::new(0));
        let poller = Poller::spawn("test", Duration::from_secs(10), counting_fetch(counter.clone()));

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state().data, Some(1));

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(poller.state().seq, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_and_interval_change() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller =
            Poller::spawn("test", RefreshInterval::TenSeconds, counting_fetch(counter.clone()));

        time::sleep(Duration::from_millis(10)).await;
        poller.refresh_now();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        poller.set_interval(RefreshInterval::ThirtySeconds);
        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2, "old timer must be cancelled");

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(poller.period(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_data_and_timer() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch_calls = calls.clone();
        let poller = Poller::spawn("test", Duration::from_secs(10), move || {
            let n = fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 2 {
                    Err(ApiError::Network {
                        message: "connection reset".to_string(),
                    })
                } else {
                    Ok(n)
                }
            }
        });

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(poller.state().data, Some(1));

        time::sleep(Duration::from_secs(10)).await;
        let state = poller.state();
        assert_eq!(state.data, Some(1));
        assert!(state.error.is_some());

        time::sleep(Duration::from_secs(10)).await;
        let state = poller.state();
        assert_eq!(state.data, Some(3));
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch_calls = calls.clone();
        let poller = Poller::spawn("test", RefreshInterval::FiveMinutes, move || {
            let n = fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let latency = if n == 1 { 5 } else { 1 };
                time::sleep(Duration::from_secs(latency)).await;
                Ok::<_, ApiError>(if n == 1 { "slow" } else { "fast" })
            }
        });

        time::sleep(Duration::from_secs(1)).await;
        poller.refresh_now();

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(poller.state().data, Some("fast"));
        assert!(poller.state().fetching);

        time::sleep(Duration::from_secs(5)).await;
        let state = poller.state();
        assert_eq!(state.data, Some("fast"));
        assert_eq!(state.seq, 2);
        assert!(!state.fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_raised_to_minimum() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller = Poller::spawn("zero", Duration::ZERO, counting_fetch(counter.clone()));
        assert_eq!(poller.period(), MIN_PERIOD);

        assert!(poller.changed().await);
        time::sleep(MIN_PERIOD * 3).await;
        assert!(counter.load(Ordering::SeqCst) >= 3);

        poller.set_interval(RefreshInterval::TenSeconds);
        poller.set_interval(Duration::ZERO);
        assert_eq!(poller.period(), MIN_PERIOD);
        assert!(poller.changed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let counter = Arc::new(AtomicU64::new(0));
        let poller = Poller::spawn("test", Duration::from_secs(10), counting_fetch(counter.clone()));

        time::sleep(Duration::from_millis(10)).await;
        poller.stop();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
