//! Per-route tenant and role allow-lists, built once at startup.

use std::collections::HashMap;

use axum::http::Method;
use service_core::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRoles {
    /// Empty accepts any tenant.
    pub tenant_ids: Vec<String>,
    /// Empty falls back to the configured default roles.
    pub roles: Vec<String>,
}

/// Immutable route authorization table keyed by method and path template.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    routes: HashMap<(Method, String), RouteRoles>,
    default_roles: Vec<String>,
}

impl RouterConfig {
    pub fn new(default_roles: Vec<String>) -> Self {
        Self {
            routes: HashMap::new(),
            default_roles: default_roles.iter().map(|r| r.to_lowercase()).collect(),
        }
    }

    pub fn with_route(
        mut self,
        method: Method,
        path: impl Into<String>,
        tenant_ids: Vec<String>,
        roles: Vec<String>,
    ) -> Self {
        let roles = roles.iter().map(|r| r.to_lowercase()).collect();
        self.routes
            .insert((method, path.into()), RouteRoles { tenant_ids, roles });
        self
    }

    /// Checks the caller's tenant and special role against the route.
    pub fn validate(
        &self,
        method: &Method,
        path: &str,
        tenant_id: &str,
        role: &str,
    ) -> Result<(), AppError> {
        let route = self.routes.get(&(method.clone(), path.to_string()));
        let roles = match route {
            Some(route) if !route.roles.is_empty() => &route.roles,
            _ => &self.default_roles,
        };
        if !roles.is_empty() && !roles.contains(&role.to_lowercase()) {
            return Err(AppError::PermissionDenied(format!(
                "role '{}' may not call {} {}",
                role, method, path
            )));
        }

        if let Some(route) = route {
            if !route.tenant_ids.is_empty() && !route.tenant_ids.iter().any(|t| t == tenant_id) {
                return Err(AppError::PermissionDenied(format!(
                    "tenant '{}' may not call {} {}",
                    tenant_id, method, path
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RouterConfig {
        RouterConfig::new(vec![])
            .with_route(Method::DELETE, "/v1.0/users/:id", vec![], vec!["Admin".into()])
            .with_route(
                Method::GET,
                "/v1.0/operator/tenants",
                vec!["t-ops".into()],
                vec!["operator".into()],
            )
    }

    #[test]
    fn route_roles_are_case_insensitive() {
        let cfg = config();
        assert!(cfg.validate(&Method::DELETE, "/v1.0/users/:id", "t1", "admin").is_ok());
        assert!(cfg.validate(&Method::DELETE, "/v1.0/users/:id", "t1", "ADMIN").is_ok());
        assert!(cfg.validate(&Method::DELETE, "/v1.0/users/:id", "t1", "").is_err());
    }

    #[test]
    fn tenant_allow_list_is_enforced() {
        let cfg = config();
        assert!(cfg.validate(&Method::GET, "/v1.0/operator/tenants", "t-ops", "operator").is_ok());
        assert!(cfg.validate(&Method::GET, "/v1.0/operator/tenants", "t1", "operator").is_err());
    }

    #[test]
    fn unlisted_routes_use_default_roles() {
        let open = config();
        assert!(open.validate(&Method::GET, "/v1.0/projects", "t1", "").is_ok());

        let restricted = RouterConfig::new(vec!["admin".into(), "none".into()]);
        assert!(restricted.validate(&Method::GET, "/v1.0/projects", "t1", "none").is_ok());
        assert!(restricted.validate(&Method::GET, "/v1.0/projects", "t1", "edge").is_err());
    }
}
