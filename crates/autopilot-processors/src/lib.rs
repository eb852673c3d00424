//! Processors and dispatcher (§2 components 4 and 6, §4.2, §4.4).
//!
//! A processor's job is purely "listen for a request, call the matching
//! service, publish the outcome" — the apply-verb decision itself lives in
//! `autopilot-services`. Stateless processors (`SecretsEngine`,
//! `PasswordPolicy`) do this immediately; chain-based processors (`Issuer`,
//! `PKIRole`, `Password`, `SSHKey`) first resolve a declared upstream
//! reference through a private dependency graph.

pub mod cancellation;
pub mod chain;
pub mod dispatcher;
pub mod limiter;
pub mod stateless;
pub mod wiring;

pub use cancellation::{run_cancellable, CancellationToken};
pub use chain::ChainProcessor;
pub use dispatcher::Dispatcher;
pub use limiter::DispatchLimiter;
pub use stateless::StatelessProcessor;
pub use wiring::Processors;

use autopilot_types::{ApplyResult, Manifest};
use futures::future::BoxFuture;
use std::sync::Arc;

/// A type-erased `Manifest -> ApplyResult` call into one kind's service —
/// how processors stay generic over which of the six services they drive.
pub type ApplyFn = Arc<dyn Fn(Manifest) -> BoxFuture<'static, ApplyResult> + Send + Sync>;
