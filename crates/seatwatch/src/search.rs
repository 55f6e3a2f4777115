//! Debounced search input.
//!
//! Raw keystrokes go in, committed queries come out. A query is committed after
//! the input has been quiet for the configured period (300 ms by default), or
//! immediately on submit/clear. Intermediate values are never committed.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Input events coming from a search field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// The field now contains this text
    Input(String),
    /// Enter was pressed
    Submit,
    /// The field was cleared
    Clear,
}

/// Handle to a running debounce loop. Dropping it discards any pending value.
pub struct Debouncer {
    events: mpsc::UnboundedSender<SearchEvent>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Starts the debounce loop and returns the handle together with the
    /// receiver of committed queries.
    pub fn spawn(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let (commits, commit_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(quiet, event_rx, commits));
        (Self { events, task }, commit_rx)
    }

    pub fn send(&self, event: SearchEvent) {
        let _ = self.events.send(event);
    }

    pub fn input(&self, text: impl Into<String>) {
        self.send(SearchEvent::Input(text.into()));
    }

    pub fn submit(&self) {
        self.send(SearchEvent::Submit);
    }

    pub fn clear(&self) {
        self.send(SearchEvent::Clear);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    quiet: Duration,
    mut events: mpsc::UnboundedReceiver<SearchEvent>,
    commits: mpsc::UnboundedSender<String>,
) {
    let mut text = String::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let wake_at = deadline.unwrap_or_else(Instant::now);

        let commit = tokio::select! {
            event = events.recv() => match event {
                Some(SearchEvent::Input(value)) => {
                    text = value;
                    deadline = Some(Instant::now() + quiet);
                    None
                }
                Some(SearchEvent::Submit) if !text.is_empty() => {
                    deadline = None;
                    Some(text.clone())
                }
                Some(SearchEvent::Submit) => None,
                Some(SearchEvent::Clear) => {
                    text.clear();
                    deadline = None;
                    Some(String::new())
                }
                None => break,
            },
            _ = time::sleep_until(wake_at), if deadline.is_some() => {
                deadline = None;
                Some(text.clone())
            }
        };

        if let Some(query) = commit {
            debug!(query = %query, "Search query committed");
            if commits.send(query).is_err() {
                break;
            }
        }
    }
}
