use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use log::info;

use crate::progress::ByteNum;
use crate::stats::format_throughput;

#[derive(Debug)]
enum ReadyState<T> {
    Pending,
    Ready(Arc<T>),
    Closed,
}

/// One-shot value published by the source once the run's shape is known.
#[derive(Debug)]
pub(super) struct ReadySignal<T> {
    state: Mutex<ReadyState<T>>,
    cvar: Condvar,
}

impl<T> ReadySignal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReadyState::Pending),
            cvar: Condvar::new(),
        }
    }

    /// Publishes the value and wakes up every waiting worker.
    ///
    /// # Panics
    /// Panics if a value has already been published or the signal was closed.
    pub fn publish(&self, value: T) -> Arc<T> {
        let mut state = self.state.lock().expect("Could not acquire ready lock");
        assert!(
            matches!(*state, ReadyState::Pending),
            "Ready signal published twice"
        );

        let value = Arc::new(value);
        *state = ReadyState::Ready(value.clone());
        self.cvar.notify_all();
        value
    }

    /// Closes the signal without a value, unless one was published.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("Could not acquire ready lock");

        if matches!(*state, ReadyState::Pending) {
            *state = ReadyState::Closed;
            self.cvar.notify_all();
        }
    }

    /// Blocks until the value is published (`Some`) or the signal is closed
    /// (`None`).
    pub fn wait(&self) -> Option<Arc<T>> {
        let mut state = self.state.lock().expect("Could not acquire ready lock");
        loop {
            match &*state {
                ReadyState::Pending => {}
                ReadyState::Ready(value) => return Some(value.clone()),
                ReadyState::Closed => return None,
            }

            state = self.cvar.wait(state).expect("Could not acquire ready lock");
        }
    }
}

/// Counters updated by the source and the workers during a run.
#[derive(Debug)]
pub(super) struct PipelineCounters {
    start_time: Instant,
    bytes: AtomicUsize,
    records: AtomicUsize,
    skipped_records: AtomicUsize,
    skipped_lines: AtomicUsize,
}

impl PipelineCounters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bytes: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
            skipped_records: AtomicUsize::new(0),
            skipped_lines: AtomicUsize::new(0),
        }
    }

    pub fn add_bytes(&self, bytes: ByteNum) {
        self.bytes.fetch_add(bytes.get(), Ordering::Relaxed);
    }

    pub fn inc_records(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped_records(&self) {
        self.skipped_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_skipped_lines(&self, num: usize) {
        self.skipped_lines.store(num, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> RunStats {
        RunStats {
            bytes: ByteNum::new(self.bytes.load(Ordering::SeqCst)),
            records: self.records.load(Ordering::SeqCst),
            skipped_records: self.skipped_records.load(Ordering::SeqCst),
            skipped_lines: self.skipped_lines.load(Ordering::SeqCst),
        }
    }

    pub fn print_stats(&self) {
        let stats = self.snapshot();

        info!(
            "Read {}",
            format_throughput(self.start_time, stats.bytes, stats.records)
        );
        if stats.skipped_records > 0 || stats.skipped_lines > 0 {
            info!(
                "Skipped {} malformed records and {} out of place lines",
                stats.skipped_records, stats.skipped_lines
            );
        }
    }
}

/// Totals of a finished run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct RunStats {
    /// Decompressed input bytes consumed.
    pub bytes: ByteNum,
    /// Records sent to the workers.
    pub records: usize,
    /// Records dropped because they could not be decoded.
    pub skipped_records: usize,
    /// Lines dropped because they appeared where no record can start.
    pub skipped_lines: usize,
}

/// State shared by the source and the workers of one run. The record channel
/// is not part of it, so that it disconnects once every worker is gone.
#[derive(Debug)]
pub(super) struct SharedState<C> {
    pub ready: ReadySignal<C>,
    pub counters: PipelineCounters,
}

impl<C> SharedState<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: ReadySignal::new(),
            counters: PipelineCounters::new(),
        }
    }
}
