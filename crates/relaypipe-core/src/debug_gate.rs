use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Whether verbose tracing has been toggled on via [`enable_debug_trap`].
pub fn verbose_debugging() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn set_verbose_debugging(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

/// Emits a debug-level trace only while verbose debugging is toggled on.
///
/// Mirrors the original's `dprint`, which stayed silent unless an operator had
/// sent the debug signal.
#[macro_export]
macro_rules! dprint {
    ($($arg:tt)*) => {
        if $crate::debug_gate::verbose_debugging() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Spawns a task that flips [`verbose_debugging`] on receipt of a debug signal —
/// `SIGINFO` where the platform defines one (BSD, macOS), `SIGUSR1` elsewhere.
///
/// A no-op on platforms without Unix signals.
pub fn enable_debug_trap() {
    #[cfg(unix)]
    {
        let Ok(mut sig) = debug_signal() else {
            tracing::warn!("failed to install debug signal handler");
            return;
        };
        tokio::spawn(async move {
            while sig.recv().await.is_some() {
                let now = !verbose_debugging();
                set_verbose_debugging(now);
                tracing::info!(verbose = now, "toggled verbose debug tracing");
            }
        });
    }
    #[cfg(not(unix))]
    {
        tracing::debug!("debug signal trap is unavailable on this platform");
    }
}

#[cfg(unix)]
fn debug_signal() -> std::io::Result<tokio::signal::unix::Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    {
        // SIGINFO has no portable SignalKind constructor; 29 is its number on
        // the BSD family and Darwin.
        signal(SignalKind::from_raw(29))
    }
    #[cfg(not(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        signal(SignalKind::user_defined1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_roundtrips() {
        let before = verbose_debugging();
        set_verbose_debugging(!before);
        assert_eq!(verbose_debugging(), !before);
        set_verbose_debugging(before);
    }
}
