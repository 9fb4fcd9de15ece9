//! Signal handling for the sync run.
//!
//! The first SIGINT, SIGTERM or SIGHUP cancels the run's
//! [`CancellationToken`]; each pass notices at its next page boundary. A
//! second signal exits immediately with status 130.

use std::io;

use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal forces the process down.
const FORCED_EXIT_CODE: i32 = 130;

/// The termination signals the sync listens for.
struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next signal and return its name.
    async fn next(&mut self) -> io::Result<&'static str> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
            _ = self.terminate.recv() => Ok("SIGTERM"),
            _ = self.hangup.recv() => Ok("SIGHUP"),
        }
    }
}

#[cfg(not(unix))]
impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    async fn next(&mut self) -> io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|_| "Ctrl+C")
    }
}

/// Spawn the signal listener and return the token it cancels.
pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let run_token = token.clone();

    tokio::spawn(async move {
        let mut signals = match Signals::register() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Failed to register signal handlers: {}", e);
                return;
            }
        };

        loop {
            let name = match signals.next().await {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!("Stopped listening for signals: {}", e);
                    return;
                }
            };
            if run_token.is_cancelled() {
                tracing::warn!(signal = name, "Second signal received, exiting now");
                std::process::exit(FORCED_EXIT_CODE);
            }
            tracing::info!(
                signal = name,
                "Stopping after the page each pass is working on; signal again to exit now"
            );
            run_token.cancel();
        }
    });

    token
}
