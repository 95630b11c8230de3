use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_PAYLOAD_MAX_BYTES: usize = 1 << 20;
pub const BULK_PAYLOAD_MAX_BYTES: usize = 1 << 30;
pub const LOG_PAYLOAD_MAX_FIELDS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    /// Instance name recorded as message origin and in audit records.
    pub hostname: String,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub audit: AuditConfig,
    pub features: FeatureConfig,
    pub limits: LimitsConfig,
    pub messaging: MessagingConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared HS256 secret. Ignored when an RSA key pair is configured.
    pub secret: Option<String>,
    pub public_key_path: Option<String>,
    pub private_key_path: Option<String>,
    pub token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub disable_audit_log: bool,
    pub enable_audit_log_of_read_req: bool,
    /// `PUT .../events` is treated as a read request unless this is set.
    pub enable_audit_log_of_put_event: bool,
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            disable_audit_log: false,
            enable_audit_log_of_read_req: false,
            enable_audit_log_of_put_event: false,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureConfig {
    pub enable_trial: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub default_payload_max_bytes: usize,
    pub bulk_payload_max_bytes: usize,
    pub log_payload_max_fields: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_payload_max_bytes: DEFAULT_PAYLOAD_MAX_BYTES,
            bulk_payload_max_bytes: BULK_PAYLOAD_MAX_BYTES,
            log_payload_max_fields: LOG_PAYLOAD_MAX_FIELDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    pub edge_sync_timeout_secs: u64,
    pub edge_channel_capacity: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            edge_sync_timeout_secs: 30,
            edge_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebConfig {
    /// Static content root served for unmatched non-API paths.
    pub content_dir: Option<String>,
    /// Roles accepted on routes without an explicit allow-list. Empty accepts any role.
    pub default_route_roles: Vec<String>,
}

impl FleetConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(FleetConfig {
            common: common_config,
            hostname: env::var("HOSTNAME").unwrap_or_else(|_| "fleet-service".to_string()),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("fleet_db"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").ok(),
                public_key_path: env::var("JWT_PUBLIC_KEY_PATH").ok(),
                private_key_path: env::var("JWT_PRIVATE_KEY_PATH").ok(),
                token_expiry_minutes: parse_env("JWT_TOKEN_EXPIRY_MINUTES", 60),
            },
            audit: AuditConfig {
                disable_audit_log: parse_env("DISABLE_AUDIT_LOG", false),
                enable_audit_log_of_read_req: parse_env("ENABLE_AUDIT_LOG_OF_READ_REQ", false),
                enable_audit_log_of_put_event: parse_env("ENABLE_AUDIT_LOG_OF_PUT_EVENT", false),
                queue_capacity: parse_env("AUDIT_QUEUE_CAPACITY", 1024),
            },
            features: FeatureConfig {
                enable_trial: parse_env("ENABLE_TRIAL", false),
            },
            limits: LimitsConfig {
                default_payload_max_bytes: parse_env(
                    "DEFAULT_PAYLOAD_MAX_BYTES",
                    DEFAULT_PAYLOAD_MAX_BYTES,
                ),
                bulk_payload_max_bytes: parse_env("BULK_PAYLOAD_MAX_BYTES", BULK_PAYLOAD_MAX_BYTES),
                log_payload_max_fields: parse_env("LOG_PAYLOAD_MAX_FIELDS", LOG_PAYLOAD_MAX_FIELDS),
            },
            messaging: MessagingConfig {
                edge_sync_timeout_secs: parse_env("EDGE_SYNC_TIMEOUT_SECS", 30),
                edge_channel_capacity: parse_env("EDGE_CHANNEL_CAPACITY", 256),
            },
            web: WebConfig {
                content_dir: env::var("CONTENT_DIR").ok().filter(|s| !s.is_empty()),
                default_route_roles: env::var("DEFAULT_ROUTE_ROLES")
                    .map(|roles| split_list(&roles))
                    .unwrap_or_default(),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(" admin, ,operator "),
            vec!["admin".to_string(), "operator".to_string()]
        );
    }

    #[test]
    fn limits_default_to_one_mib_and_one_gib() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.default_payload_max_bytes, 1_048_576);
        assert_eq!(limits.bulk_payload_max_bytes, 1_073_741_824);
        assert_eq!(limits.log_payload_max_fields, 50);
    }
}
