//! Terminal rendering of library progress events.
//!
//! Interactive terminals get indicatif spinners and bars. When stdout is
//! redirected we print one percentage line per change instead, which keeps
//! logs and IDE consoles readable.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rwflash_lib::progress::{Phase, ProgressCallback, ProgressId, ProgressInfo, ProgressType};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ABORTED: &str = "Aborted";

fn percent_of(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (current.saturating_mul(100) / total).min(100)
}

enum LineState {
    Spinner,
    Bar { total: u64, current: u64, shown: u64 },
}

/// Prints `NN%` lines on stdout.
#[derive(Default)]
pub struct PercentProgressCallback {
    states: Mutex<HashMap<u64, LineState>>,
    next_id: AtomicU64,
}

impl PercentProgressCallback {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, percent: u64) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}%", percent);
        let _ = stdout.flush();
    }
}

impl ProgressCallback for PercentProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state, percent) = match info.progress_type {
            ProgressType::Spinner => (LineState::Spinner, 0),
            ProgressType::Bar { total } => (
                LineState::Bar {
                    total,
                    current: 0,
                    shown: percent_of(0, total),
                },
                percent_of(0, total),
            ),
        };
        if let Ok(mut states) = self.states.lock() {
            states.insert(id, state);
        }
        self.emit(percent);
        ProgressId(id)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn increment(&self, id: ProgressId, delta: u64) {
        let changed = match self.states.lock() {
            Ok(mut states) => match states.get_mut(&id.0) {
                Some(LineState::Bar {
                    total,
                    current,
                    shown,
                }) => {
                    *current = current.saturating_add(delta);
                    let percent = percent_of(*current, *total);
                    (percent != *shown).then(|| {
                        *shown = percent;
                        percent
                    })
                }
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(percent) = changed {
            self.emit(percent);
        }
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        let state = self.states.lock().ok().and_then(|mut s| s.remove(&id.0));
        let complete = match state {
            Some(LineState::Bar { shown, .. }) => shown != 100,
            Some(LineState::Spinner) => true,
            None => false,
        };
        if complete && final_message != ABORTED {
            self.emit(100);
        }
    }
}

/// Draws spinners and bars with indicatif.
pub struct IndicatifProgressCallback {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<u64, ProgressBar>>,
    next_id: AtomicU64,
}

impl IndicatifProgressCallback {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn spinner(&self, phase: Phase) -> ProgressBar {
        let spinner = self.multi_progress.add(ProgressBar::new_spinner());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_style(
            ProgressStyle::with_template(&format!("[{:>7}] {{spinner}} {{msg}}", phase.as_ref()))
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner
    }

    fn bar(&self, phase: Phase, total: u64) -> ProgressBar {
        let bar = self.multi_progress.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(&format!(
                "[{:>7}] {{msg}} {{wide_bar}} {{bytes}}/{{total_bytes}} {{percent}}%",
                phase.as_ref()
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        bar
    }
}

impl Default for IndicatifProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for IndicatifProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let progress_bar = match info.progress_type {
            ProgressType::Spinner => self.spinner(info.phase),
            ProgressType::Bar { total } => self.bar(info.phase, total),
        };
        progress_bar.set_message(info.message);
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(id, progress_bar);
        }
        ProgressId(id)
    }

    fn update_message(&self, id: ProgressId, message: String) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(&id.0)
        {
            bar.set_message(message);
        }
    }

    fn increment(&self, id: ProgressId, delta: u64) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(&id.0)
        {
            bar.inc(delta);
        }
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        if let Ok(mut bars) = self.bars.lock()
            && let Some(bar) = bars.remove(&id.0)
        {
            if final_message == ABORTED {
                bar.abandon_with_message(final_message);
            } else {
                bar.finish_with_message(final_message);
            }
        }
    }
}

/// Indicatif on a terminal, percentage lines otherwise.
pub fn create_progress_callback() -> Arc<dyn ProgressCallback> {
    if io::stdout().is_terminal() {
        Arc::new(IndicatifProgressCallback::new())
    } else {
        Arc::new(PercentProgressCallback::new())
    }
}
