pub mod auth;
pub mod request_context;
pub mod route_roles;

pub use auth::{auth_middleware, AuthGate};
pub use request_context::{request_context_middleware, RequestClass};
pub use route_roles::{RouteRoles, RouterConfig};
