//! Meeting detection by process presence.
//!
//! Polls the process table and debounces the presence of known meeting apps
//! into discrete start/end events. Detection latency is bounded by the poll
//! interval; that is an accepted property of the polling design, not a bug.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use sysinfo::System;
use tracing::{debug, info};

use crate::sync::CancellationToken;

/// Process names that indicate an active meeting (case-insensitive
/// substring match).
pub const MEETING_PROCESSES: &[&str] = &[
    "zoom",
    "zoom.us",
    "teams",
    "microsoft teams",
    "webex",
    "ciscospark",
    "slack",
    "facetime",
];

/// Debounced watcher event, carrying the process name at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingEvent {
    Started(String),
    Ended(String),
}

/// Source of currently running process names.
///
/// Entries the platform refuses to expose are simply omitted from the
/// snapshot; a partial listing must never fail the poll.
pub trait ProcessLister: Send {
    fn list_process_names(&mut self) -> Vec<String>;
}

/// Process lister backed by sysinfo.
pub struct SystemProcessLister {
    system: System,
}

impl Default for SystemProcessLister {
    fn default() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl ProcessLister for SystemProcessLister {
    fn list_process_names(&mut self) -> Vec<String> {
        self.system.refresh_processes();
        self.system
            .processes()
            .values()
            .map(|process| process.name().to_string())
            .collect()
    }
}

/// Two-state debounced edge detector over process presence.
///
/// Only the presence or absence of *any* tracked process matters; switching
/// from one meeting app to another between polls emits nothing.
pub struct MeetingWatcher<L: ProcessLister> {
    lister: L,
    tracked: Vec<String>,
    poll_interval: Duration,
}

impl MeetingWatcher<SystemProcessLister> {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_lister(
            SystemProcessLister::default(),
            MEETING_PROCESSES.iter().map(|s| s.to_string()).collect(),
            poll_interval,
        )
    }
}

impl<L: ProcessLister> MeetingWatcher<L> {
    pub fn with_lister(lister: L, tracked: Vec<String>, poll_interval: Duration) -> Self {
        let tracked = tracked.into_iter().map(|t| t.to_lowercase()).collect();
        Self {
            lister,
            tracked,
            poll_interval,
        }
    }

    /// First tracked process found in the current snapshot, if any.
    fn active_meeting(&mut self) -> Option<String> {
        let names = self.lister.list_process_names();
        names.into_iter().find(|name| {
            let lower = name.to_lowercase();
            self.tracked.iter().any(|t| lower.contains(t.as_str()))
        })
    }

    /// Poll until the token is cancelled, emitting debounced events.
    pub fn watch(mut self, token: &CancellationToken, mut on_event: impl FnMut(MeetingEvent)) {
        let mut active_process: Option<String> = None;

        while !token.is_cancelled() {
            match self.active_meeting() {
                Some(name) => {
                    if active_process.is_none() {
                        info!("Meeting started: {}", name);
                        active_process = Some(name.clone());
                        on_event(MeetingEvent::Started(name));
                    }
                }
                None => {
                    if let Some(ended) = active_process.take() {
                        info!("Meeting ended: {}", ended);
                        on_event(MeetingEvent::Ended(ended));
                    }
                }
            }

            token.wait_timeout(self.poll_interval);
        }

        debug!("Meeting watcher stopped");
    }

    /// Run the watcher on its own thread.
    ///
    /// The loop observes `token` within one poll interval, so stopping via
    /// the handle is bounded by it.
    pub fn spawn(
        self,
        token: CancellationToken,
        on_event: impl FnMut(MeetingEvent) + Send + 'static,
    ) -> std::io::Result<WatcherHandle>
    where
        L: 'static,
    {
        let thread_token = token.clone();
        let thread = thread::Builder::new()
            .name("meeting-watcher".to_string())
            .spawn(move || self.watch(&thread_token, on_event))?;

        Ok(WatcherHandle {
            token,
            thread: Some(thread),
        })
    }
}

/// Handle to a watcher thread.
pub struct WatcherHandle {
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the watcher and wait for its loop to exit.
    pub fn stop(mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
