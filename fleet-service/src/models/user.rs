use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use super::auth_context::{ADMIN_ROLE, NO_SPECIAL_ROLE, OPERATOR_ROLE, OPERATOR_TENANT_ROLE};
use super::entity::{entity_identity, Entity, EntityType, Scoping};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Tenant-level role, e.g. `USER`, `INFRA_ADMIN`, `OPERATOR`.
    #[serde(default)]
    pub role: String,
    /// Argon2 PHC hash once stored.
    #[serde(default)]
    pub password: String,
}

impl User {
    /// Role name used for route authorization.
    pub fn special_role(&self) -> &'static str {
        if self.id.is_empty() {
            return NO_SPECIAL_ROLE;
        }
        match self.role.as_str() {
            "INFRA_ADMIN" => ADMIN_ROLE,
            "OPERATOR" => OPERATOR_ROLE,
            "OPERATOR_TENANT" => OPERATOR_TENANT_ROLE,
            _ => NO_SPECIAL_ROLE,
        }
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        PasswordHash::new(&self.password)
            .map(|hash| {
                Argon2::default()
                    .verify_password(candidate.as_bytes(), &hash)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to hash password: {}", e)))
}

#[async_trait]
impl Entity for User {
    const ENTITY_TYPE: EntityType = EntityType::User;
    const SCOPING: Scoping<Self> = Scoping::TenantGlobal;

    entity_identity!();

    fn public_view(&self) -> Result<Value, AppError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("password");
        }
        Ok(value)
    }

    fn carry_over(&mut self, previous: &Self) {
        if self.password.is_empty() {
            self.password = previous.password.clone();
        }
    }

    fn before_store(&mut self) -> Result<(), AppError> {
        if !self.password.is_empty() && PasswordHash::new(&self.password).is_err() {
            self.password = hash_password(&self.password)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: "u1".into(),
            tenant_id: "t1".into(),
            email: "ops@example.com".into(),
            name: "Ops".into(),
            role: role.into(),
            password: "s3cret".into(),
        }
    }

    #[test]
    fn special_role_follows_tenant_role() {
        assert_eq!(user("INFRA_ADMIN").special_role(), "admin");
        assert_eq!(user("OPERATOR").special_role(), "operator");
        assert_eq!(user("OPERATOR_TENANT").special_role(), "operator_tenant");
        assert_eq!(user("USER").special_role(), "none");
    }

    #[test]
    fn stored_password_is_hashed_once_and_verifiable() {
        let mut u = user("USER");
        u.before_store().unwrap();
        let hashed = u.password.clone();
        assert_ne!(hashed, "s3cret");
        u.before_store().unwrap();
        assert_eq!(u.password, hashed);
        assert!(u.verify_password("s3cret"));
        assert!(!u.verify_password("wrong"));
    }

    #[test]
    fn public_view_omits_password() {
        let view = user("USER").public_view().unwrap();
        assert!(view.get("password").is_none());
        assert_eq!(view["email"], "ops@example.com");
    }
}
