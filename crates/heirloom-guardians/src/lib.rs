//! heirloom-guardians
//!
//! Directory of guardians: registration, admin verification, reputation,
//! commitment tags, and the per-guardian workload quota the will engine
//! consults when attaching guardians to new wills.

pub mod registry;

pub use registry::{GuardianConfig, GuardianRegistry};
