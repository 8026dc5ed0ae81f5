//! Role-based access control.

pub mod audit;
pub mod check;
pub mod types;

pub use audit::{log_authz, AuthzAuditEvent};
pub use types::{Capability, PermissionTable, Role, UnknownRole};
