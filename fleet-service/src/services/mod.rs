pub mod audit;
pub mod database;
pub mod directory;
pub mod events;
pub mod jwt;
pub mod memory;
pub mod messaging;
pub mod metrics;
pub mod repository;
pub mod store;

pub use audit::{AuditSink, AuditWriter};
pub use database::FleetDb;
pub use directory::{IdentityResolver, ObjectDirectory};
pub use events::{EntityCrudEvent, EventListener, EventPublisher, ENTITY_CRUD_EVENT};
pub use jwt::JwtService;
pub use memory::MemoryDb;
pub use messaging::{ChannelHub, EdgeMessage, MessagingError, MessagingService, TenantMessage};
pub use repository::Repository;
pub use store::{DocumentStore, EntityStore, NotifyCallback};
