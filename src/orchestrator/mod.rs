//! Worker pool orchestration.
//!
//! Covers the lifecycle event channel, process spawning, the slot
//! registry, the restart decision, signal wiring and the supervisor that
//! ties them together.

pub mod events;
pub mod policy;
pub mod registry;
pub mod signals;
pub mod spawner;
pub mod supervisor;

pub use events::{ClusterEvent, EventReceiver, EventSender};
pub use policy::{RestartDecision, RestartPolicy};
pub use registry::WorkerRegistry;
pub use spawner::{ProcessSpawner, WorkerSpawner};
pub use supervisor::Supervisor;
