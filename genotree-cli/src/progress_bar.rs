use std::sync::{Arc, Mutex};
use std::time::Duration;

use genotree::progress::{ByteNum, ProgressNotifier};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// What the bar is currently counting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Phase {
    /// Decompressed input bytes; the total is known only for plain files.
    Reading { total_bytes: Option<u64> },
    /// Merge iterations of the clusterer.
    Clustering { merges: u64 },
}

#[derive(Debug)]
struct PhaseState {
    phase: Phase,
    styled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct GenotreeProgressBar {
    bar: ProgressBar,
    state: Arc<Mutex<PhaseState>>,
}

impl GenotreeProgressBar {
    pub fn new() -> GenotreeProgressBar {
        let bar = ProgressBar::hidden();
        bar.set_style(ProgressStyle::default_spinner());
        bar.enable_steady_tick(Duration::from_millis(50));
        bar.set_message("Starting...");

        Self {
            bar,
            state: Arc::new(Mutex::new(PhaseState {
                phase: Phase::Reading { total_bytes: None },
                styled: false,
            })),
        }
    }

    pub fn show(&self) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear()
    }

    pub fn println<I: AsRef<str>>(&self, msg: I) {
        self.bar.println(msg);
    }

    pub fn start_reading(&self, total_bytes: Option<u64>) {
        self.switch_phase(Phase::Reading { total_bytes });
    }

    fn switch_phase(&self, phase: Phase) {
        let mut state = self.lock_state();
        state.phase = phase;
        state.styled = false;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PhaseState> {
        self.state.lock().expect("Could not acquire progress bar lock")
    }

    /// Applies the style of the current phase on its first event, so that
    /// the elapsed time and rate start from there.
    #[inline]
    fn ensure_styled(&self) {
        let mut state = self.lock_state();
        if state.styled {
            return;
        }

        let (style, length, message) = match state.phase {
            Phase::Reading {
                total_bytes: Some(total),
            } => (
                ProgressStyle::default_bar()
                    .template("{msg} {wide_bar} {bytes}/{total_bytes} [ETA {eta}]"),
                Some(total),
                "Reading",
            ),
            Phase::Reading { total_bytes: None } => (
                ProgressStyle::default_spinner()
                    .template("{spinner} {msg} {bytes} ({bytes_per_sec})"),
                None,
                "Reading",
            ),
            Phase::Clustering { merges } => (
                ProgressStyle::default_bar().template("{msg} {wide_bar} {pos}/{len} [ETA {eta}]"),
                Some(merges),
                "Clustering",
            ),
        };

        self.bar
            .set_style(style.expect("Invalid progress bar template"));
        if let Some(length) = length {
            self.bar.set_length(length);
        }
        self.bar.set_position(0);
        self.bar.reset_elapsed();
        self.bar.set_message(message);
        state.styled = true;
    }
}

impl ProgressNotifier for GenotreeProgressBar {
    fn processed_bytes(&self, bytes: ByteNum) {
        self.ensure_styled();
        self.bar.inc(bytes.get() as u64);
    }

    fn set_iter_num(&self, num_iter: u64) {
        self.switch_phase(Phase::Clustering { merges: num_iter });
        self.ensure_styled();
    }

    fn inc_iter(&self) {
        self.ensure_styled();
        self.bar.inc(1);
    }
}
