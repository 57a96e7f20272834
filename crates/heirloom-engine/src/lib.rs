//! heirloom-engine
//!
//! The will engine: the coordinated state machine at the centre of the
//! inheritance system. Tracks owner liveness, collects guardian approvals
//! into a quorum, gates release behind a mandatory timelock, and — once a
//! will finalizes — dispatches asset distribution and guardian bookkeeping.
//!
//! The engine is a policy core: it owns no clock and no network. Every
//! operation takes an explicit `now`, and the host (or the bundled tokio
//! driver in [`scheduler`]) decides when to tick.

pub mod dispatch;
pub mod engine;
pub mod scheduler;

pub use dispatch::{DispatchOutcome, ReleaseDispatcher};
pub use engine::{CreateWillParams, EngineConfig, FinalizeOutcome, WillEngine};
pub use scheduler::{run_scheduler, tick};
