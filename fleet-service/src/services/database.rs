use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde_json::Value;
use service_core::error::AppError;

use super::audit::AuditSink;
use super::store::DocumentStore;
use crate::models::{AuditLog, EntityType};

const DUPLICATE_KEY: i32 = 11000;

const ENTITY_COLLECTIONS: [EntityType; 9] = [
    EntityType::Project,
    EntityType::Category,
    EntityType::User,
    EntityType::ServiceDomain,
    EntityType::DataSource,
    EntityType::DataPipeline,
    EntityType::Application,
    EntityType::CloudProfile,
    EntityType::Script,
];

#[derive(Clone)]
pub struct FleetDb {
    client: MongoClient,
    db: Database,
}

impl FleetDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for fleet-service");

        for entity_type in ENTITY_COLLECTIONS {
            self.create_index(
                entity_type.collection(),
                doc! { "tenantId": 1, "id": 1 },
                "tenant_id_idx",
                true,
            )
            .await?;
        }

        self.create_index("users", doc! { "email": 1 }, "email_idx", true)
            .await?;
        self.create_index("projects", doc! { "edgeIds": 1 }, "edge_ids_idx", false)
            .await?;
        self.create_index("projects", doc! { "users.userId": 1 }, "users_idx", false)
            .await?;
        self.create_index(
            "applications",
            doc! { "dataIfcEndpoints.id": 1 },
            "data_ifc_endpoints_idx",
            false,
        )
        .await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        name: &str,
        unique: bool,
    ) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(name.to_string())
                    .unique(unique)
                    .build(),
            )
            .build();

        self.collection(collection)
            .create_index(index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create {} index on {}: {}", name, collection, e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

fn key_filter(tenant_id: &str, id: &str) -> Document {
    doc! { "tenantId": tenant_id, "id": id }
}

fn to_document(value: &Value) -> Result<Document, AppError> {
    bson::to_document(value).map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
}

fn to_value(mut document: Document) -> Result<Value, AppError> {
    document.remove("_id");
    bson::from_document(document).map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
}

fn db_error(action: &str, collection: &str, e: mongodb::error::Error) -> AppError {
    tracing::error!("Failed to {} in {}: {}", action, collection, e);
    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl DocumentStore for FleetDb {
    async fn get(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        self.collection(collection)
            .find_one(key_filter(tenant_id, id), None)
            .await
            .map_err(|e| db_error("find document", collection, e))?
            .map(to_value)
            .transpose()
    }

    async fn list(&self, collection: &str, tenant_id: &str) -> Result<Vec<Value>, AppError> {
        let cursor = self
            .collection(collection)
            .find(doc! { "tenantId": tenant_id }, None)
            .await
            .map_err(|e| db_error("list documents", collection, e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect documents", collection, e))?;
        documents.into_iter().map(to_value).collect()
    }

    async fn find(
        &self,
        collection: &str,
        tenant_id: Option<&str>,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        let mut filter = Document::new();
        if let Some(tenant_id) = tenant_id {
            filter.insert("tenantId", tenant_id);
        }
        filter.insert(field, value);

        let cursor = self
            .collection(collection)
            .find(filter, None)
            .await
            .map_err(|e| db_error("query documents", collection, e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect documents", collection, e))?;
        documents.into_iter().map(to_value).collect()
    }

    async fn insert(&self, collection: &str, doc: Value) -> Result<(), AppError> {
        let document = to_document(&doc)?;
        match self.collection(collection).insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Duplicate(format!(
                "{} {}",
                collection,
                doc.get("id").and_then(Value::as_str).unwrap_or_default()
            ))),
            Err(e) => Err(db_error("insert document", collection, e)),
        }
    }

    async fn replace(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, AppError> {
        let result = self
            .collection(collection)
            .replace_one(key_filter(tenant_id, id), to_document(&doc)?, None)
            .await
            .map_err(|e| db_error("replace document", collection, e))?;
        Ok(result.matched_count > 0)
    }

    async fn remove(
        &self,
        collection: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        self.collection(collection)
            .find_one_and_delete(key_filter(tenant_id, id), None)
            .await
            .map_err(|e| db_error("delete document", collection, e))?
            .map(to_value)
            .transpose()
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
        let key_value = element.get(key).and_then(Value::as_str).unwrap_or_default();
        let mut filter = key_filter(tenant_id, id);
        filter.insert(format!("{}.{}", field, key), doc! { "$ne": key_value });

        let mut push = Document::new();
        push.insert(field, Bson::Document(to_document(&element)?));

        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$push": push }, None)
            .await
            .map_err(|e| db_error("update document", collection, e))?;
        if result.modified_count > 0 {
            return Ok(Some(true));
        }

        let exists = self.get(collection, tenant_id, id).await?.is_some();
        Ok(exists.then_some(false))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.health_check().await
    }
}

#[async_trait]
impl AuditSink for FleetDb {
    async fn write_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
        let collection = record.collection_name();
        let document = bson::to_document(record)
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        self.collection(&collection)
            .insert_one(document, None)
            .await
            .map_err(|e| db_error("write audit log", &collection, e))?;
        Ok(())
    }
}
