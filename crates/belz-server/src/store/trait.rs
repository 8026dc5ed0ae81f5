//! Record store trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Store operation result.
pub type StoreResult<T> = Result<T, StoreError>;

/// A schemaless row as the collaborator database returns it.
pub type Record = serde_json::Map<String, Value>;

/// Collaborator errors. The message is passed through to the client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Row-level security or grant denial.
    #[error("{0}")]
    PermissionDenied(String),
    /// Backend is unreachable.
    #[error("{0}")]
    Unavailable(String),
    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Collections the API reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// User accounts.
    Usuarios,
    /// Sales proposals.
    Propostas,
    /// Movement requests.
    Solicitacoes,
    /// Login sessions.
    Sessoes,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Collection; 4] = [
        Collection::Usuarios,
        Collection::Propostas,
        Collection::Solicitacoes,
        Collection::Sessoes,
    ];

    /// Backend table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Usuarios => "usuarios",
            Collection::Propostas => "propostas",
            Collection::Solicitacoes => "solicitacoes",
            Collection::Sessoes => "sessoes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator database seam.
///
/// Implementations hold no per-request state and must be shareable across
/// handlers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of a collection, newest first.
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Record>>;

    /// A record by id.
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Record>>;

    /// First record whose `field` equals `value`.
    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Option<Record>>;

    /// Insert a record; returns it with `id` and `created_at` filled in.
    async fn insert(&self, collection: Collection, record: Record) -> StoreResult<Record>;

    /// Merge `patch` into an existing record. `None` if it does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> StoreResult<Option<Record>>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Cheap reachability check for health probes.
    async fn ping(&self) -> StoreResult<()>;
}
