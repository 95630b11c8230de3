//! In-process document store, used by tests and local runs without MongoDB.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use service_core::error::AppError;

use super::audit::AuditSink;
use super::store::DocumentStore;
use crate::models::AuditLog;

type Key = (String, String, String);

#[derive(Default)]
pub struct MemoryDb {
    docs: Mutex<BTreeMap<Key, Value>>,
    audit_logs: Mutex<Vec<(String, AuditLog)>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit records with the collection each was written to.
    pub fn audit_logs(&self) -> Vec<(String, AuditLog)> {
        self.audit_logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn key(collection: &str, tenant_id: &str, id: &str) -> Key {
        (collection.to_string(), tenant_id.to_string(), id.to_string())
    }
}

fn str_field<'a>(doc: &'a Value, field: &str) -> Result<&'a str, AppError> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("document is missing {}", field)))
}

/// Whether `value` at the dotted `path` equals `target`; arrays match element-wise.
fn matches(value: &Value, path: &[&str], target: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| matches(item, path, target)),
        _ => match path.split_first() {
            None => value.as_str() == Some(target),
            Some((head, rest)) => value
                .get(*head)
                .is_some_and(|inner| matches(inner, rest, target)),
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryDb {
    async fn get(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs.get(&Self::key(collection, tenant_id, id)).cloned())
    }

    async fn list(&self, collection: &str, tenant_id: &str) -> Result<Vec<Value>, AppError> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs
            .iter()
            .filter(|((c, t, _), _)| c == collection && t == tenant_id)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn find(
        &self,
        collection: &str,
        tenant_id: Option<&str>,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        let path: Vec<&str> = field.split('.').collect();
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs
            .iter()
            .filter(|((c, t, _), _)| c == collection && tenant_id.map_or(true, |id| id == t))
            .filter(|(_, doc)| matches(doc, &path, value))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<(), AppError> {
        let key = Self::key(
            collection,
            str_field(&doc, "tenantId")?,
            str_field(&doc, "id")?,
        );
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        if docs.contains_key(&key) {
            return Err(AppError::Duplicate(format!("{} {}", collection, key.2)));
        }
        docs.insert(key, doc);
        Ok(())
    }

    async fn replace(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        match docs.get_mut(&Self::key(collection, tenant_id, id)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs.remove(&Self::key(collection, tenant_id, id)))
    }

    async fn push_unique(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
        field: &str,
        key: &str,
        element: Value,
    ) -> Result<Option<bool>, AppError> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(doc) = docs.get_mut(&Self::key(collection, tenant_id, id)) else {
            return Ok(None);
        };
        let Some(obj) = doc.as_object_mut() else {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "stored document is not an object"
            )));
        };
        let list = obj
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(items) = list.as_array_mut() else {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "{} is not an array",
                field
            )));
        };
        if items.iter().any(|item| item.get(key) == element.get(key)) {
            return Ok(Some(false));
        }
        items.push(element);
        Ok(Some(true))
    }
}

#[async_trait]
impl AuditSink for MemoryDb {
    async fn write_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
        self.audit_logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((record.collection_name(), record.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn find_descends_into_arrays_of_objects() {
        let db = MemoryDb::new();
        db.insert(
            "projects",
            json!({"id": "p1", "tenantId": "t1", "users": [{"userId": "u1", "role": "PROJECT_ADMIN"}], "edgeIds": ["e1"]}),
        )
        .await
        .unwrap();
        db.insert("projects", json!({"id": "p2", "tenantId": "t2", "edgeIds": ["e1"]}))
            .await
            .unwrap();

        assert_eq!(db.find("projects", Some("t1"), "users.userId", "u1").await.unwrap().len(), 1);
        assert_eq!(db.find("projects", Some("t1"), "edgeIds", "e1").await.unwrap().len(), 1);
        assert_eq!(db.find("projects", None, "edgeIds", "e1").await.unwrap().len(), 2);
        assert!(db.find("projects", Some("t1"), "edgeIds", "e2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let db = MemoryDb::new();
        let doc = json!({"id": "x", "tenantId": "t1"});
        db.insert("categories", doc.clone()).await.unwrap();
        let err = db.insert("categories", doc).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn push_unique_is_idempotent() {
        let db = MemoryDb::new();
        db.insert("projects", json!({"id": "p1", "tenantId": "t1"}))
            .await
            .unwrap();
        let member = json!({"userId": "u1", "role": "PROJECT_ADMIN"});
        assert_eq!(
            db.push_unique("projects", "t1", "p1", "users", "userId", member.clone()).await.unwrap(),
            Some(true)
        );
        assert_eq!(
            db.push_unique("projects", "t1", "p1", "users", "userId", member.clone()).await.unwrap(),
            Some(false)
        );
        assert_eq!(
            db.push_unique("projects", "t1", "nope", "users", "userId", member).await.unwrap(),
            None
        );
    }
}
