//! In-memory record store.

use super::r#trait::{Collection, Record, RecordStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

/// In-memory store used by development mode and tests.
///
/// Supports failure injection: [`InMemoryStore::set_offline`] makes every
/// call fail as unavailable, [`InMemoryStore::deny`] makes a collection fail
/// as a permission denial.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Record>>>,
    denied: RwLock<HashSet<Collection>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the collaborator being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate a row-level security denial on `collection`.
    pub fn deny(&self, collection: Collection) {
        self.denied.write().insert(collection);
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    fn check(&self, collection: Collection) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store unavailable".to_string()));
        }
        if self.denied.read().contains(&collection) {
            return Err(StoreError::PermissionDenied(format!(
                "permission denied for table {}",
                collection
            )));
        }
        Ok(())
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        self.check(collection)?;
        let mut records: Vec<Record> = self
            .collections
            .read()
            .get(&collection)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();

        records.sort_by(|a, b| {
            let a = a.get("created_at").and_then(Value::as_str).unwrap_or_default();
            let b = b.get("created_at").and_then(Value::as_str).unwrap_or_default();
            b.cmp(a)
        });
        Ok(records)
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Record>> {
        self.check(collection)?;
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|rows| rows.get(id).cloned()))
    }

    async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Option<Record>> {
        self.check(collection)?;
        Ok(self.collections.read().get(&collection).and_then(|rows| {
            rows.values()
                .find(|row| row.get(field) == Some(value))
                .cloned()
        }))
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> StoreResult<Record> {
        self.check(collection)?;

        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        record.insert("id".to_string(), Value::String(id.clone()));
        record.entry("created_at").or_insert_with(now);

        let mut collections = self.collections.write();
        let rows = collections.entry(collection).or_default();
        if rows.contains_key(&id) {
            return Err(StoreError::Backend(format!(
                "duplicate key value violates unique constraint on {}.id",
                collection
            )));
        }
        rows.insert(id.clone(), record.clone());

        debug!(collection = %collection, id = %id, "Record inserted");
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> StoreResult<Option<Record>> {
        self.check(collection)?;

        let mut collections = self.collections.write();
        let Some(row) = collections.get_mut(&collection).and_then(|rows| rows.get_mut(id)) else {
            return Ok(None);
        };

        for (key, value) in patch {
            if key != "id" {
                row.insert(key, value);
            }
        }
        row.insert("updated_at".to_string(), now());

        debug!(collection = %collection, id = %id, "Record updated");
        Ok(Some(row.clone()))
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.check(collection)?;
        let removed = self
            .collections
            .write()
            .get_mut(&collection)
            .and_then(|rows| rows.remove(id))
            .is_some();

        if removed {
            debug!(collection = %collection, id = %id, "Record deleted");
        }
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        let row = store
            .insert(Collection::Propostas, record(json!({"cliente": "ACME"})))
            .await
            .unwrap();

        let id = row["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert!(row.contains_key("created_at"));
        assert_eq!(store.len(Collection::Propostas), 1);
    }

    #[tokio::test]
    async fn test_insert_keeps_explicit_id() {
        let store = InMemoryStore::new();
        store
            .insert(Collection::Usuarios, record(json!({"id": "u-1"})))
            .await
            .unwrap();

        let duplicate = store
            .insert(Collection::Usuarios, record(json!({"id": "u-1"})))
            .await;
        assert!(matches!(duplicate, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_find_one_by_field() {
        let store = InMemoryStore::new();
        store
            .insert(Collection::Usuarios, record(json!({"email": "a@belz.com.br"})))
            .await
            .unwrap();
        store
            .insert(Collection::Usuarios, record(json!({"email": "b@belz.com.br"})))
            .await
            .unwrap();

        let found = store
            .find_one(Collection::Usuarios, "email", &json!("b@belz.com.br"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["email"], "b@belz.com.br");

        let missing = store
            .find_one(Collection::Usuarios, "email", &json!("c@belz.com.br"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = InMemoryStore::new();
        let row = store
            .insert(
                Collection::Propostas,
                record(json!({"cliente": "ACME", "status": "em análise"})),
            )
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();

        let updated = store
            .update(
                Collection::Propostas,
                id,
                record(json!({"status": "implantado", "id": "hijack"})),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated["status"], "implantado");
        assert_eq!(updated["cliente"], "ACME");
        assert_eq!(updated["id"], id);
        assert!(updated.contains_key("updated_at"));

        let absent = store
            .update(Collection::Propostas, "nope", Record::new())
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let row = store
            .insert(Collection::Solicitacoes, Record::new())
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();

        assert!(store.delete(Collection::Solicitacoes, id).await.unwrap());
        assert!(!store.delete(Collection::Solicitacoes, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryStore::new();
        store
            .insert(
                Collection::Propostas,
                record(json!({"cliente": "old", "created_at": "2024-01-01T00:00:00+00:00"})),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::Propostas,
                record(json!({"cliente": "new", "created_at": "2024-06-01T00:00:00+00:00"})),
            )
            .await
            .unwrap();

        let rows = store.list(Collection::Propostas).await.unwrap();
        assert_eq!(rows[0]["cliente"], "new");
        assert_eq!(rows[1]["cliente"], "old");
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let store = InMemoryStore::new();
        store.set_offline(true);

        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.list(Collection::Usuarios).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_denied_collection() {
        let store = InMemoryStore::new();
        store.deny(Collection::Propostas);

        let err = store.list(Collection::Propostas).await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
        assert_eq!(err.to_string(), "permission denied for table propostas");
        assert!(store.list(Collection::Usuarios).await.is_ok());
    }
}
