//! Ctrl-C handling.
//!
//! A pending prompt blocks in `read_line`, which retries after a signal, so
//! cancellation runs on a watcher thread rather than in the reader.

use anyhow::Result;
use signal_hook::consts::signal;

/// Runs `on_interrupt` on a background thread the first time one of
/// `signals` is delivered.
#[cfg(unix)]
pub fn watch(signals: &[i32], on_interrupt: impl FnOnce() + Send + 'static) -> Result<()> {
    let mut signals = signal_hook::iterator::Signals::new(signals)?;
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            on_interrupt();
        }
    });
    Ok(())
}

/// Ctrl-C cancels the run with exit code 1.
#[cfg(unix)]
pub fn install() -> Result<()> {
    watch(&[signal::SIGINT], || {
        eprintln!("\nOperation cancelled");
        std::process::exit(1);
    })
}

#[cfg(not(unix))]
pub fn install() -> Result<()> {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    signal_hook::flag::register_conditional_shutdown(
        signal::SIGINT,
        1,
        Arc::new(AtomicBool::new(true)),
    )?;
    Ok(())
}
