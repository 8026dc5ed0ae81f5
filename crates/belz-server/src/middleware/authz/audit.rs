//! Authorization audit logging.

use super::types::Capability;
use crate::middleware::auth::Principal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Authorization audit event.
#[derive(Debug, Serialize)]
pub struct AuthzAuditEvent {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Deciding principal.
    pub user_id: String,
    /// Role wire name of the principal.
    pub role: String,
    /// Capability that was checked.
    pub capability: String,
    /// Whether access was allowed.
    pub granted: bool,
}

impl AuthzAuditEvent {
    /// Record a decision for `principal` on `capability`.
    pub fn new(principal: &Principal, capability: Capability, granted: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: principal.id.clone(),
            role: principal.role.to_string(),
            capability: capability.to_string(),
            granted,
        }
    }

    /// Emit the event on the `audit` tracing target.
    pub fn log(&self) {
        if self.granted {
            debug!(
                event = "authz_granted",
                user_id = %self.user_id,
                role = %self.role,
                capability = %self.capability,
                "Authorization granted"
            );
        } else {
            info!(
                event = "authz_denied",
                user_id = %self.user_id,
                role = %self.role,
                capability = %self.capability,
                "Authorization denied"
            );
        }
    }
}

/// Log an authorization decision.
pub fn log_authz(principal: &Principal, capability: Capability, granted: bool) {
    AuthzAuditEvent::new(principal, capability, granted).log();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::authz::Role;

    #[test]
    fn test_audit_event_fields() {
        let principal = Principal {
            id: "u-1".into(),
            email: "consultor@belz.com.br".into(),
            role: Role::Consultor,
        };

        let event = AuthzAuditEvent::new(&principal, Capability::ManageUsers, false);
        assert_eq!(event.user_id, "u-1");
        assert_eq!(event.role, "consultor");
        assert_eq!(event.capability, "manageUsers");
        assert!(!event.granted);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["granted"], false);
    }
}
