use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use service_core::error::AppError;

use crate::models::audit_log::bearer_token;
use crate::models::auth_context::claim_keys;
use crate::models::project::PROJECT_ROLE_ADMIN;
use crate::models::{AuthContext, ProjectRole};
use crate::services::{IdentityResolver, ObjectDirectory};
use crate::AppState;

/// Loads the caller's durable identity and project memberships into the
/// request's [`AuthContext`].
pub struct AuthGate {
    identity: Arc<dyn IdentityResolver>,
    directory: Arc<dyn ObjectDirectory>,
    enable_trial: bool,
}

impl AuthGate {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        directory: Arc<dyn ObjectDirectory>,
        enable_trial: bool,
    ) -> Self {
        Self {
            identity,
            directory,
            enable_trial,
        }
    }

    pub async fn enrich(&self, auth: &mut AuthContext) -> Result<(), AppError> {
        self.update_claim_user(auth).await?;
        self.update_claim_projects(auth).await
    }

    async fn update_claim_user(&self, auth: &mut AuthContext) -> Result<(), AppError> {
        let lookup = if let Some(email) = auth.email() {
            self.identity.get_user_by_email(email).await
        } else if let Some(id) = auth.user_id() {
            self.identity.get_user(id).await
        } else {
            return Ok(());
        };

        let user = lookup.map_err(|e| {
            tracing::warn!(tenant_id = %auth.tenant_id, error = %e, "Token user not found");
            AppError::Unauthorized(anyhow::anyhow!("user lookup failed: {}", e))
        })?;
        if user.tenant_id != auth.tenant_id {
            tracing::warn!(
                tenant_id = %auth.tenant_id,
                user_tenant_id = %user.tenant_id,
                "Token tenant does not match user tenant"
            );
            return Err(AppError::Unauthorized(anyhow::anyhow!("tenant mismatch")));
        }

        auth.claims.insert(
            claim_keys::SPECIAL_ROLE.into(),
            Value::String(user.special_role().to_string()),
        );
        auth.claims
            .insert(claim_keys::ID.into(), Value::String(user.id.clone()));
        Ok(())
    }

    async fn update_claim_projects(&self, auth: &mut AuthContext) -> Result<(), AppError> {
        if let Some(user_id) = auth.user_id().map(str::to_string) {
            let mut roles = self
                .identity
                .get_user_project_roles(&auth.tenant_id, &user_id)
                .await
                .map_err(|e| AppError::ServerNotReady(anyhow::anyhow!(e)))?;
            if self.enable_trial {
                match self
                    .ensure_trial_memberships(&auth.tenant_id, &user_id, &mut roles)
                    .await
                {
                    Err(e @ AppError::PermissionDenied(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(tenant_id = %auth.tenant_id, user_id = %user_id, error = %e, "Trial project membership not granted")
                    }
                    Ok(()) => {}
                }
            }
            auth.set_project_roles(&roles);
        } else if let Some(edge_id) = auth.edge_id().map(str::to_string) {
            let roles = self
                .identity
                .get_edge_project_roles(&auth.tenant_id, &edge_id)
                .await
                .map_err(|e| AppError::ServerNotReady(anyhow::anyhow!(e)))?;
            auth.set_project_roles(&roles);
        }
        Ok(())
    }

    /// Adds the user to every pooled trial project they are missing from.
    async fn ensure_trial_memberships(
        &self,
        tenant_id: &str,
        user_id: &str,
        roles: &mut Vec<ProjectRole>,
    ) -> Result<(), AppError> {
        let claim = match self.identity.get_tenant_claim(tenant_id).await {
            Ok(claim) => claim,
            Err(AppError::NotFound(_)) => {
                tracing::debug!(tenant_id = %tenant_id, "No tenant claim, not a trial tenant");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if !claim.trial {
            return Ok(());
        }
        if claim.is_expired_trial() {
            return Err(AppError::PermissionDenied("Trial expired".to_string()));
        }
        for project_id in claim.project_ids() {
            if roles.iter().any(|r| r.project_id == project_id) {
                continue;
            }
            self.directory
                .ensure_project_member(tenant_id, project_id, user_id, PROJECT_ROLE_ADMIN)
                .await?;
            roles.push(ProjectRole {
                project_id: project_id.to_string(),
                role: PROJECT_ROLE_ADMIN.to_string(),
            });
        }
        Ok(())
    }
}

/// Verifies the bearer token, authorizes the route and enriches the caller
/// identity before handing the request on.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("missing bearer token")))?;
    let claims = state
        .jwt
        .verify(token)
        .map_err(|e| AppError::Unauthorized(anyhow::anyhow!("invalid token: {}", e)))?;
    let tenant_id = claims
        .get(claim_keys::TENANT_ID)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("token has no tenant")))?
        .to_string();
    let mut auth = AuthContext::new(tenant_id, claims);

    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    state
        .route_config
        .validate(req.method(), &path, &auth.tenant_id, auth.special_role())
        .map_err(|e| {
            tracing::debug!(tenant_id = %auth.tenant_id, error = %e, "Route authorization failed");
            AppError::Unauthorized(anyhow::anyhow!(e))
        })?;

    state.auth_gate.enrich(&mut auth).await?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("no auth context on request")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DocumentStore, MemoryDb, Repository};
    use serde_json::json;

    fn gate(db: Arc<MemoryDb>) -> AuthGate {
        let repository = Arc::new(Repository::new(db));
        AuthGate::new(repository.clone(), repository, true)
    }

    #[tokio::test]
    async fn tenant_without_claim_is_not_a_trial() {
        let gate = gate(Arc::new(MemoryDb::new()));
        let mut roles = Vec::new();

        gate.ensure_trial_memberships("t1", "u1", &mut roles)
            .await
            .unwrap();
        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn expired_trial_is_denied() {
        let db = Arc::new(MemoryDb::new());
        db.insert(
            "tenant_claims",
            json!({"id": "t1", "tenantId": "t1", "trial": true, "state": "DELETING"}),
        )
        .await
        .unwrap();
        let mut roles = Vec::new();

        let err = gate(db)
            .ensure_trial_memberships("t1", "u1", &mut roles)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }
}
