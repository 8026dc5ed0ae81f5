//! Roles, capabilities and the static permission table.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// User categories. The set is closed: adding a role is a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administrator; the only role that manages users or deletes proposals.
    Gestor,
    /// Manager; sees every dashboard.
    Gerente,
    /// Implementation analyst; works proposals assigned to them.
    AnalistaImplantacao,
    /// Movement analyst; handles solicitações.
    AnalistaMovimentacao,
    /// Sales consultant; sees only their own proposals.
    Consultor,
    /// Client-side analyst with dashboard access only.
    AnalistaCliente,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 6] = [
        Role::Gestor,
        Role::Gerente,
        Role::AnalistaImplantacao,
        Role::AnalistaMovimentacao,
        Role::Consultor,
        Role::AnalistaCliente,
    ];

    /// Wire name of the role, as stored in `tipo_usuario`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gestor => "gestor",
            Self::Gerente => "gerente",
            Self::AnalistaImplantacao => "analista_implantacao",
            Self::AnalistaMovimentacao => "analista_movimentacao",
            Self::Consultor => "consultor",
            Self::AnalistaCliente => "analista_cliente",
        }
    }

    /// Workflow analysts (implantação and movimentação).
    pub fn is_analyst(&self) -> bool {
        matches!(self, Self::AnalistaImplantacao | Self::AnalistaMovimentacao)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `tipo_usuario` value that names no known role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Named, gate-checked actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Dashboard over every user's data.
    ViewDashboardAll,
    /// Dashboard over the caller's own data.
    ViewDashboardOwn,
    /// Create and list users.
    ManageUsers,
    /// List and create proposals.
    ViewPropostas,
    /// Change a proposal's status.
    EditPropostasStatus,
    /// Delete proposals.
    DeletePropostas,
    /// List solicitações.
    ViewMovimentacao,
    /// File a solicitação.
    CreateSolicitacao,
    /// Attach documents to a proposal.
    UploadPropostaDocs,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 9] = [
        Capability::ViewDashboardAll,
        Capability::ViewDashboardOwn,
        Capability::ManageUsers,
        Capability::ViewPropostas,
        Capability::EditPropostasStatus,
        Capability::DeletePropostas,
        Capability::ViewMovimentacao,
        Capability::CreateSolicitacao,
        Capability::UploadPropostaDocs,
    ];

    /// Wire name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewDashboardAll => "viewDashboardAll",
            Self::ViewDashboardOwn => "viewDashboardOwn",
            Self::ManageUsers => "manageUsers",
            Self::ViewPropostas => "viewPropostas",
            Self::EditPropostasStatus => "editPropostasStatus",
            Self::DeletePropostas => "deletePropostas",
            Self::ViewMovimentacao => "viewMovimentacao",
            Self::CreateSolicitacao => "createSolicitacao",
            Self::UploadPropostaDocs => "uploadPropostaDocs",
        }
    }

    /// Look a capability up by its wire name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Capability::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static mapping of capability to the roles allowed to exercise it.
///
/// Built once at startup and only read afterwards. A capability without an
/// entry is denied to every role.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: HashMap<Capability, HashSet<Role>>,
}

impl PermissionTable {
    /// The production table.
    pub fn new() -> Self {
        use Role::*;

        Self::empty()
            .grant(Capability::ViewDashboardAll, &[Gestor, Gerente])
            .grant(
                Capability::ViewDashboardOwn,
                &[
                    Gestor,
                    Gerente,
                    AnalistaImplantacao,
                    AnalistaMovimentacao,
                    Consultor,
                    AnalistaCliente,
                ],
            )
            .grant(Capability::ManageUsers, &[Gestor])
            .grant(
                Capability::ViewPropostas,
                &[Gestor, Gerente, AnalistaImplantacao, Consultor],
            )
            .grant(
                Capability::EditPropostasStatus,
                &[Gestor, Gerente, AnalistaImplantacao],
            )
            .grant(Capability::DeletePropostas, &[Gestor])
            .grant(
                Capability::ViewMovimentacao,
                &[Gestor, Gerente, AnalistaMovimentacao, Consultor],
            )
            .grant(
                Capability::CreateSolicitacao,
                &[Gestor, Gerente, AnalistaMovimentacao, Consultor],
            )
            .grant(
                Capability::UploadPropostaDocs,
                &[Gestor, Gerente, AnalistaImplantacao, Consultor],
            )
    }

    /// A table that denies everything.
    pub fn empty() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    /// Grant a capability to the listed roles.
    pub fn grant(mut self, capability: Capability, roles: &[Role]) -> Self {
        self.grants
            .entry(capability)
            .or_default()
            .extend(roles.iter().copied());
        self
    }

    /// Whether `role` may exercise `capability`.
    pub fn allows(&self, role: Role, capability: Capability) -> bool {
        self.grants
            .get(&capability)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// Whether `role` may exercise the capability named `capability`.
    ///
    /// Unknown names are denied.
    pub fn allows_named(&self, role: Role, capability: &str) -> bool {
        Capability::parse(capability)
            .map(|c| self.allows(role, c))
            .unwrap_or(false)
    }

    /// Roles granted a capability, if it is enumerated.
    pub fn roles_for(&self, capability: Capability) -> Option<&HashSet<Role>> {
        self.grants.get(&capability)
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new()
    }
}
