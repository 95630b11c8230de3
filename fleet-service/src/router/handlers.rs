//! Handler factories shared by every entity route.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
    routing::{on, MethodFilter, MethodRouter},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use service_core::middleware::RequestId;
use uuid::Uuid;

use super::notify::DispatchContext;
use crate::models::auth_context::claim_keys;
use crate::models::{AuthContext, Entity, ObjectRequest, Operation};
use crate::services::{EntityCrudEvent, EntityStore, ENTITY_CRUD_EVENT};
use crate::AppState;

/// Rewrites a decoded request body before it is converted to the entity.
pub type PreProcess = fn(&mut Value, &HashMap<String, String>);

/// `?forceUpdate=true` becomes `forceUpdate: true` in the body.
pub fn inject_force_update(body: &mut Value, query: &HashMap<String, String>) {
    let forced = query
        .get("forceUpdate")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if let (true, Some(object)) = (forced, body.as_object_mut()) {
        object.insert("forceUpdate".into(), Value::Bool(true));
    }
}

/// A method-bound handler ready to be mounted on a path.
pub struct RouteHandler {
    pub method: Method,
    pub handler: MethodRouter<AppState>,
}

impl RouteHandler {
    fn new(method: Method, handler: MethodRouter<AppState>) -> Self {
        Self { method, handler }
    }
}

fn method_filter(method: &Method) -> MethodFilter {
    match *method {
        Method::POST => MethodFilter::POST,
        Method::PUT => MethodFilter::PUT,
        Method::DELETE => MethodFilter::DELETE,
        Method::PATCH => MethodFilter::PATCH,
        _ => MethodFilter::GET,
    }
}

fn decode<T: Entity>(
    body: &Bytes,
    query: &HashMap<String, String>,
    pre_process: Option<PreProcess>,
) -> Result<T, AppError> {
    let mut value: Value = serde_json::from_slice(body)?;
    if let Some(pre_process) = pre_process {
        pre_process(&mut value, query);
    }
    Ok(serde_json::from_value(value)?)
}

fn dispatch_context(request_id: &RequestId, auth: &AuthContext) -> DispatchContext {
    DispatchContext::new(request_id.as_str(), auth.tenant_id.clone())
}

pub fn make_create_handle<T: Entity>(pre_process: Option<PreProcess>) -> RouteHandler {
    let handler = move |State(state): State<AppState>,
                        auth: AuthContext,
                        request_id: RequestId,
                        Query(query): Query<HashMap<String, String>>,
                        body: Bytes| async move {
        let doc: T = decode(&body, &query, pre_process)?;
        let notify = state
            .notifier
            .callback::<T>(dispatch_context(&request_id, &auth), Operation::Create);
        let created = EntityStore::<T>::create(&state.repository, &auth, doc, notify).await?;
        Ok::<_, AppError>(Json(created))
    };
    RouteHandler::new(Method::POST, on(MethodFilter::POST, handler))
}

pub fn make_update_handle<T: Entity>(pre_process: Option<PreProcess>) -> RouteHandler {
    let handler = move |State(state): State<AppState>,
                        auth: AuthContext,
                        request_id: RequestId,
                        Path(id): Path<String>,
                        Query(query): Query<HashMap<String, String>>,
                        body: Bytes| async move {
        let mut doc: T = decode(&body, &query, pre_process)?;
        doc.set_id(id);
        let notify = state
            .notifier
            .callback::<T>(dispatch_context(&request_id, &auth), Operation::Update);
        let updated = EntityStore::<T>::update(&state.repository, &auth, doc, notify).await?;
        Ok::<_, AppError>(Json(updated))
    };
    RouteHandler::new(Method::PUT, on(MethodFilter::PUT, handler))
}

/// Deletes the entity, notifies recipients and publishes an
/// [`EntityCrudEvent`] for in-process subscribers.
pub fn make_delete_handle<T: Entity>() -> RouteHandler {
    let handler = |State(state): State<AppState>,
                   auth: AuthContext,
                   request_id: RequestId,
                   Path(id): Path<String>| async move {
        let notify = state
            .notifier
            .callback::<T>(dispatch_context(&request_id, &auth), Operation::Delete);
        let deleted = EntityStore::<T>::delete(&state.repository, &auth, &id, notify).await?;

        state.events.publish(
            ENTITY_CRUD_EVENT,
            EntityCrudEvent {
                id: Uuid::new_v4().to_string(),
                tenant_id: auth.tenant_id.clone(),
                entity_id: id,
                entity_type: T::ENTITY_TYPE.canonical_name().to_string(),
                message: T::ENTITY_TYPE.message(Operation::Delete),
            },
        );
        Ok::<_, AppError>(Json(deleted))
    };
    RouteHandler::new(Method::DELETE, on(MethodFilter::DELETE, handler))
}

pub fn make_get_handle<T: Entity>() -> RouteHandler {
    let handler = |State(state): State<AppState>, auth: AuthContext, Path(id): Path<String>| async move {
        let doc: T = EntityStore::<T>::get(&state.repository, &auth, &id).await?;
        Ok::<_, AppError>(Json(doc.public_view()?))
    };
    RouteHandler::new(Method::GET, on(MethodFilter::GET, handler))
}

pub fn make_get_all_handle<T: Entity>() -> RouteHandler {
    let handler = |State(state): State<AppState>, auth: AuthContext| async move {
        let docs: Vec<T> = EntityStore::<T>::select_all(&state.repository, &auth).await?;
        let views = docs
            .iter()
            .map(Entity::public_view)
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, AppError>(Json(Value::Array(views)))
    };
    RouteHandler::new(Method::GET, on(MethodFilter::GET, handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeQuery {
    #[serde(default)]
    edge_id: String,
}

/// Sends `message` to the edge named by `?edgeId=` and waits for its reply,
/// which becomes the response body. The path id is sent as `id_field`.
pub fn make_custom_message_handle(
    method: Method,
    message: &'static str,
    id_field: &'static str,
) -> RouteHandler {
    let handler = move |State(state): State<AppState>,
                        auth: AuthContext,
                        request_id: RequestId,
                        Path(id): Path<String>,
                        Query(query): Query<EdgeQuery>| async move {
        if query.edge_id.is_empty() {
            return Err(AppError::BadRequest("edgeId query parameter is required".into()));
        }
        let ctx = dispatch_context(&request_id, &auth);
        let payload = serde_json::to_value(ObjectRequest {
            request_id: ctx.request_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            doc: json!({ id_field: id, "edgeId": query.edge_id }),
        })?;
        let reply = state
            .notifier
            .send_sync(&ctx, &query.edge_id, message, payload)
            .await?;
        Ok::<_, AppError>(Json(reply))
    };
    let filter = method_filter(&method);
    RouteHandler::new(method, on(filter, handler))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Exchanges email and password for a signed token.
pub fn make_login_handle() -> RouteHandler {
    let handler = |State(state): State<AppState>, body: Bytes| async move {
        let request: LoginRequest = serde_json::from_slice(&body)?;
        let user = state
            .identity
            .get_user_by_email(&request.email)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Login for unknown user");
                AppError::InvalidCredentials
            })?;
        if !user.verify_password(&request.password) {
            tracing::info!(tenant_id = %user.tenant_id, "Login rejected");
            return Err(AppError::InvalidCredentials);
        }

        let mut claims = Map::new();
        claims.insert(claim_keys::TENANT_ID.into(), Value::String(user.tenant_id.clone()));
        claims.insert(claim_keys::ID.into(), Value::String(user.id.clone()));
        claims.insert(claim_keys::EMAIL.into(), Value::String(user.email.clone()));
        claims.insert(
            claim_keys::SPECIAL_ROLE.into(),
            Value::String(user.special_role().to_string()),
        );
        let token = state.jwt.issue(claims)?;
        tracing::info!(tenant_id = %user.tenant_id, user_id = %user.id, "Login succeeded");
        Ok::<_, AppError>(Json(json!({ "token": token })))
    };
    RouteHandler::new(Method::POST, on(MethodFilter::POST, handler))
}
