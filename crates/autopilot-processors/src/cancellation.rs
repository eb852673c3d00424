//! Cooperative cancellation (§5 "Cancellation"): a single
//! [`CancellationToken`] shared by the dispatcher and every processor. The
//! driver cancels it once on a shutdown signal; everything downstream stops
//! starting new applies at its next suspension point and lets in-flight ones
//! finish.

pub use tokio_util::sync::CancellationToken;

/// Race `fut` against cancellation. `None` means the token fired first and
/// `fut` was abandoned — used at each processor's leaf apply call, the one
/// outbound-Vault-call suspension point §5 names for this purpose.
pub async fn run_cancellable<F: std::future::Future>(
    token: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}
