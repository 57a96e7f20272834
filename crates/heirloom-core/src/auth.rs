use serde::{Deserialize, Serialize};

use crate::error::HeirloomError;
use crate::types::Principal;

// ── Role ─────────────────────────────────────────────────────────────────────

/// Privileged roles recognised by the engine. The host ledger decides who
/// holds which role; the engine only matches an [`Auth`] against the role an
/// operation requires.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Super-admin. Satisfies every role check.
    DefaultAdmin,
    /// Operational admin: pause gate, guardian verification, reputation.
    Admin,
    /// Component-to-component role: asset release and guardian bookkeeping.
    WillManager,
    /// Drives scheduler_perform and finalize_release.
    Scheduler,
}

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Caller identity plus the roles the host attests for this call. Threaded
/// explicitly into every privileged operation instead of decorator-style
/// checks, so the authorization decision is visible at each call site.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub principal: Principal,
    roles: Vec<Role>,
}

impl Auth {
    /// An unprivileged caller.
    pub fn new(principal: Principal) -> Self {
        Self { principal, roles: Vec::new() }
    }

    pub fn with_role(principal: Principal, role: Role) -> Self {
        Self { principal, roles: vec![role] }
    }

    pub fn with_roles(principal: Principal, roles: Vec<Role>) -> Self {
        Self { principal, roles }
    }

    /// True if this auth carries `role` (DefaultAdmin carries everything).
    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(&role) || self.roles.contains(&Role::DefaultAdmin)
    }

    /// Error with `Unauthorized` unless this auth carries `role`.
    pub fn require(&self, role: Role) -> Result<(), HeirloomError> {
        if self.has(role) {
            Ok(())
        } else {
            Err(HeirloomError::Unauthorized { required: role })
        }
    }
}
