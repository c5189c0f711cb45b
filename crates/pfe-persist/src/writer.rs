//! # Debounced Writer
//!
//! A Tokio task that mirrors settled states to every configured sink. Each
//! [`save`](DebouncedWriter::save) replaces the pending state and restarts
//! the debounce timer; when the timer fires, only the latest state is
//! written. A burst of N saves inside the window therefore costs one write.
//!
//! ```text
//!  save(v2) ─┐
//!  save(v3) ─┼─► pending = v4 ──(debounce elapsed)──► sinks.write(v4)
//!  save(v4) ─┘
//! ```
//!
//! [`discard`](DebouncedWriter::discard) drops whatever is pending and keeps
//! the task running; [`flush_now`](DebouncedWriter::flush_now) writes it
//! immediately; [`close`](DebouncedWriter::close) writes it and stops the
//! task. [`cancel`](DebouncedWriter::cancel) is teardown: it drops the
//! pending state and stops the task, so later saves are ignored.
//!
//! Sinks run on the blocking pool, one state at a time. Sink failures are
//! logged and counted, never propagated: persistence is a mirror and must
//! not affect the in-memory state.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pfe_state::FilterState;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::CancellationToken;

use crate::error::PersistenceError;
use crate::sink::StateSink;

enum Command {
    Save(Box<FilterState>),
    Discard,
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    writes: AtomicU64,
    failures: AtomicU64,
    coalesced: AtomicU64,
}

/// Counters of a writer since it was spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WriterStats {
    /// States written (each to every sink).
    pub writes: u64,
    /// Individual sink writes that failed.
    pub failures: u64,
    /// Pending states replaced by a newer one before being written.
    pub coalesced: u64,
}

/// Handle to the writer task.
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for DebouncedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedWriter")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl DebouncedWriter {
    /// Spawn on the current Tokio runtime.
    pub fn spawn(sinks: Vec<Arc<dyn StateSink>>, debounce: Duration) -> Result<Self, PersistenceError> {
        let handle = Handle::try_current().map_err(|_| PersistenceError::NoRuntime)?;
        Ok(Self::spawn_on(&handle, sinks, debounce))
    }

    /// Spawn on `handle`.
    pub fn spawn_on(handle: &Handle, sinks: Vec<Arc<dyn StateSink>>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let task = handle.spawn(run(rx, cancel.clone(), sinks.into(), debounce, counters.clone()));
        tracing::debug!(debounce_ms = debounce.as_millis() as u64, "debounced writer spawned");
        Self {
            tx,
            cancel,
            counters,
            task,
        }
    }

    /// Queue `state`, replacing any pending one and restarting the timer.
    pub fn save(&self, state: &FilterState) {
        if self.tx.send(Command::Save(Box::new(state.clone()))).is_err() {
            tracing::debug!(version = state.version(), "writer stopped; save ignored");
        }
    }

    /// Write the pending state now, if any, and wait for it.
    pub async fn flush_now(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Drop the pending state, if any. Later saves are written as usual.
    pub fn discard(&self) {
        if self.tx.send(Command::Discard).is_err() {
            tracing::debug!("writer stopped; discard ignored");
        }
    }

    /// Drop the pending state and stop the task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Write the pending state, if any, then stop the task and wait for it.
    pub async fn close(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        if let Err(err) = task.await {
            tracing::warn!(%err, "debounced writer task ended abnormally");
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            writes: self.counters.writes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    sinks: Arc<[Arc<dyn StateSink>]>,
    debounce: Duration,
    counters: Arc<Counters>,
) {
    let mut pending: Option<Box<FilterState>> = None;
    let mut timer: Option<Pin<Box<Sleep>>> = None;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Some(dropped) = pending.take() {
                    tracing::debug!(version = dropped.version(), "pending write cancelled");
                }
                break;
            }
            cmd = rx.recv() => match cmd {
                Some(Command::Save(state)) => {
                    if pending.replace(state).is_some() {
                        counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                    timer = Some(Box::pin(sleep(debounce)));
                }
                Some(Command::Discard) => {
                    timer = None;
                    if let Some(dropped) = pending.take() {
                        tracing::debug!(version = dropped.version(), "pending write discarded");
                    }
                }
                Some(Command::Flush(ack)) => {
                    timer = None;
                    if let Some(state) = pending.take() {
                        persist(&sinks, state, &counters).await;
                    }
                    let _ = ack.send(());
                }
                None => {
                    if let Some(state) = pending.take() {
                        persist(&sinks, state, &counters).await;
                    }
                    break;
                }
            },
            _ = async {
                if let Some(t) = &mut timer {
                    t.await;
                }
            }, if timer.is_some() => {
                timer = None;
                if let Some(state) = pending.take() {
                    persist(&sinks, state, &counters).await;
                }
            }
        }
    }
    tracing::debug!("debounced writer stopped");
}

async fn persist(sinks: &Arc<[Arc<dyn StateSink>]>, state: Box<FilterState>, counters: &Arc<Counters>) {
    let sinks = sinks.clone();
    let counters = counters.clone();
    let version = state.version();
    if let Err(err) = tokio::task::spawn_blocking(move || write_all(&sinks, &state, &counters)).await {
        tracing::warn!(version, %err, "persistence write task failed");
    }
}

fn write_all(sinks: &[Arc<dyn StateSink>], state: &FilterState, counters: &Counters) {
    for sink in sinks {
        if let Err(err) = sink.write(state) {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(sink = sink.name(), version = state.version(), %err, "persistence write failed");
        }
    }
    counters.writes.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(version = state.version(), sinks = sinks.len(), "state persisted");
}
