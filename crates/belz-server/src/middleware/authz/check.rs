//! Permission checks against an authenticated principal.

use super::audit::log_authz;
use super::types::{Capability, PermissionTable};
use crate::{error::ApiError, middleware::auth::Principal};

impl PermissionTable {
    /// Whether `principal` holds the capability named `capability`.
    ///
    /// A missing principal or an unknown capability name is a denial.
    pub fn has_permission(&self, principal: Option<&Principal>, capability: &str) -> bool {
        principal
            .map(|p| self.allows_named(p.role, capability))
            .unwrap_or(false)
    }

    /// Check `capability` for `principal`, recording the decision.
    pub fn check(&self, principal: &Principal, capability: Capability) -> bool {
        let granted = self.allows(principal.role, capability);
        log_authz(principal, capability, granted);
        granted
    }

    /// Like [`PermissionTable::check`] but yields a 403 error on denial.
    pub fn require(&self, principal: &Principal, capability: Capability) -> Result<(), ApiError> {
        if self.check(principal, capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "access denied: {} is not allowed to {}",
                principal.role, capability
            )))
        }
    }
}
