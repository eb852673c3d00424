//! Signal-driven graceful shutdown (§5 "Cancellation"):
//! `SIGHUP`/`SIGTERM`/`SIGINT`/`SIGTSTP` all request the same graceful
//! shutdown; there is no distinct handling per signal.

/// Wait for whichever arrives first among the four shutdown-requesting
/// signals. Resolves to the signal's conventional name, used only for
/// logging.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).expect("installing SIGHUP handler");
    let mut terminate = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut stop = signal(SignalKind::from_raw(libc_sigtstp()))
        .expect("installing SIGTSTP handler");

    tokio::select! {
        _ = hangup.recv() => "SIGHUP",
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
        _ = stop.recv() => "SIGTSTP",
    }
}

/// `SIGTSTP` has no portable constant in `tokio::signal::unix::SignalKind`;
/// its raw number is stable across every target this crate ships for
/// (Linux, macOS, the BSDs all agree: 20).
#[cfg(unix)]
const fn libc_sigtstp() -> std::os::raw::c_int {
    20
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "CTRL_C"
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once_sighup_is_delivered() {
        let waiter = tokio::spawn(wait_for_shutdown_signal());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        unsafe {
            libc::raise(libc::SIGHUP);
        }
        let signal = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_for_shutdown_signal should resolve")
            .expect("task should not panic");
        assert_eq!(signal, "SIGHUP");
    }
}
