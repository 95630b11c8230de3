//! Static route table of the REST API.

use axum::http::Method;

use super::handlers::{
    inject_force_update, make_create_handle, make_custom_message_handle, make_delete_handle,
    make_get_all_handle, make_get_handle, make_login_handle, make_update_handle, PreProcess,
    RouteHandler,
};
use super::RouteDescriptor;
use crate::models::auth_context::ADMIN_ROLE;
use crate::models::{
    Application, Category, CloudProfile, DataPipeline, DataSource, Entity, Project, Script,
    ServiceDomain, User,
};

pub const API_PREFIX: &str = "/v1.0";

const GET_APPLICATION_CONTAINERS: &str = "getApplicationContainers";

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|r| r.to_string()).collect()
}

fn authenticated(path: String, route: RouteHandler, allowed: &[&str]) -> RouteDescriptor {
    RouteDescriptor {
        method: route.method,
        path,
        tenant_ids: Vec::new(),
        roles: roles(allowed),
        public: false,
        handler: route.handler,
    }
}

/// Read, create, update and delete routes for one entity type. Mutations
/// are limited to `write_roles` when it is non-empty.
fn crud<T: Entity>(
    resource: &str,
    write_roles: &[&str],
    pre_process: Option<PreProcess>,
) -> Vec<RouteDescriptor> {
    let collection = format!("{}/{}", API_PREFIX, resource);
    let item = format!("{}/:id", collection);
    vec![
        authenticated(collection.clone(), make_get_all_handle::<T>(), &[]),
        authenticated(item.clone(), make_get_handle::<T>(), &[]),
        authenticated(collection, make_create_handle::<T>(pre_process), write_roles),
        authenticated(item.clone(), make_update_handle::<T>(pre_process), write_roles),
        authenticated(item, make_delete_handle::<T>(), write_roles),
    ]
}

pub fn route_table() -> Vec<RouteDescriptor> {
    let mut routes = vec![RouteDescriptor {
        public: true,
        ..authenticated(format!("{}/login", API_PREFIX), make_login_handle(), &[])
    }];

    routes.extend(crud::<Project>("projects", &[ADMIN_ROLE], None));
    routes.extend(crud::<Category>("categories", &[ADMIN_ROLE], None));
    routes.extend(crud::<User>("users", &[ADMIN_ROLE], None));
    routes.extend(crud::<ServiceDomain>("servicedomains", &[ADMIN_ROLE], None));
    routes.extend(crud::<DataSource>("datasources", &[], None));
    routes.extend(crud::<DataPipeline>("datapipelines", &[], None));
    routes.extend(crud::<Application>("applications", &[], None));
    routes.extend(crud::<CloudProfile>("cloudprofiles", &[ADMIN_ROLE], None));
    routes.extend(crud::<Script>("scripts", &[], Some(inject_force_update)));

    routes.push(authenticated(
        format!("{}/applications/:id/containers", API_PREFIX),
        make_custom_message_handle(Method::GET, GET_APPLICATION_CONTAINERS, "applicationId"),
        &[],
    ));

    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_login_is_public() {
        let routes = route_table();
        let public: Vec<_> = routes.iter().filter(|r| r.public).map(|r| r.path.as_str()).collect();
        assert_eq!(public, vec!["/v1.0/login"]);
    }

    #[test]
    fn every_entity_has_five_routes() {
        let routes = route_table();
        let scripts: Vec<_> = routes
            .iter()
            .filter(|r| r.path.starts_with("/v1.0/scripts"))
            .map(|r| r.method.clone())
            .collect();
        assert_eq!(
            scripts,
            vec![Method::GET, Method::GET, Method::POST, Method::PUT, Method::DELETE]
        );
    }

    #[test]
    fn user_mutations_require_admin() {
        let routes = route_table();
        let delete = routes
            .iter()
            .find(|r| r.path == "/v1.0/users/:id" && r.method == Method::DELETE)
            .unwrap();
        assert_eq!(delete.roles, vec!["admin".to_string()]);
    }
}
