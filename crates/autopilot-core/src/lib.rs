//! The engine's leaf components (§2): a process-local event bus, a
//! directed dependency graph guarded by a single lock, and a snapshot
//! repository backed by a pluggable [`snapshot::SnapshotBackend`].
//!
//! Nothing in this crate knows how to talk to Vault — that seam is filled
//! by `autopilot-vault` at the workflow layer, keeping this crate testable
//! without a network.

pub mod events;
pub mod graph;
pub mod snapshot;

pub use events::{Event, EventBus, EventPayload, EventVariant, HandlerResult, Stage, UnresolvedEdge};
pub use graph::{DependencyGraph, EdgeStatus, GraphState, NodeStatus};
pub use snapshot::{SnapshotBackend, SnapshotRepository};
