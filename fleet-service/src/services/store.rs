//! Persistence seams: raw tenant-scoped documents and typed entity stores.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use service_core::error::AppError;

use crate::models::{AuthContext, Entity};

/// Tenant-scoped JSON document storage keyed by `(tenantId, id)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, tenant_id: &str, id: &str)
        -> Result<Option<Value>, AppError>;

    async fn list(&self, collection: &str, tenant_id: &str) -> Result<Vec<Value>, AppError>;

    /// Documents whose `field` equals `value`. Dotted paths descend into
    /// nested objects and arrays match element-wise. `None` searches every tenant.
    async fn find(
        &self,
        collection: &str,
        tenant_id: Option<&str>,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError>;

    /// Inserts a document carrying `id` and `tenantId`. Fails with
    /// `Duplicate` when the key exists.
    async fn insert(&self, collection: &str, doc: Value) -> Result<(), AppError>;

    /// Replaces an existing document. Returns false when none matched.
    async fn replace(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError>;

    /// Removes and returns the stored document.
    async fn remove(&self, collection: &str, tenant_id: &str, id: &str)
        -> Result<Option<Value>, AppError>;

    /// Appends `element` to the array `field` unless an element with the same
    /// `key` value is present. `None` when the document does not exist,
    /// otherwise whether the element was added.
    async fn push_unique(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
        field: &str,
        key: &str,
        element: Value,
    ) -> Result<Option<bool>, AppError>;

    /// Backend reachability, used by the health endpoint.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Consume-once hook invoked by a store after a mutation commits.
pub struct NotifyCallback<T>(Box<dyn FnOnce(T) -> BoxFuture<'static, ()> + Send>);

impl<T: Send + 'static> NotifyCallback<T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Box::new(move |doc| Box::pin(f(doc))))
    }

    pub fn noop() -> Self {
        Self::new(|_| async {})
    }

    pub async fn call(self, doc: T) {
        (self.0)(doc).await
    }
}

/// Typed CRUD over one entity kind.
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    async fn select_all(&self, auth: &AuthContext) -> Result<Vec<T>, AppError>;

    async fn get(&self, auth: &AuthContext, id: &str) -> Result<T, AppError>;

    async fn create(
        &self,
        auth: &AuthContext,
        doc: T,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError>;

    async fn update(
        &self,
        auth: &AuthContext,
        doc: T,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError>;

    async fn delete(
        &self,
        auth: &AuthContext,
        id: &str,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn callback_receives_the_document() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let callback = NotifyCallback::new(move |doc: String| async move {
            *sink.lock().unwrap() = Some(doc);
        });
        callback.call("x".to_string()).await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("x"));
    }
}
