pub mod application;
pub mod audit_log;
pub mod auth_context;
pub mod category;
pub mod cloud_profile;
pub mod data_pipeline;
pub mod data_source;
pub mod entity;
pub mod envelope;
pub mod project;
pub mod script;
pub mod service_domain;
pub mod tenant_claim;
pub mod user;

pub use application::Application;
pub use audit_log::AuditLog;
pub use auth_context::{AuthContext, ProjectRole};
pub use category::{Category, CategoryInfo};
pub use cloud_profile::CloudProfile;
pub use data_pipeline::DataPipeline;
pub use data_source::DataSource;
pub use entity::{DataIfcEndpoint, Entity, EntityState, EntityType, OpType, Operation, Scoping};
pub use envelope::{DeleteRequest, ObjectRequest};
pub use project::Project;
pub use script::Script;
pub use service_domain::ServiceDomain;
pub use tenant_claim::TenantClaim;
pub use user::User;
