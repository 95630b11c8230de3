use axum::http::{header, HeaderMap, Method, Uri};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::auth_context::claim_keys;
use crate::utils::truncate_string;

/// Longest string stored per audit field.
pub const MAX_AUDIT_FIELD_BYTES: usize = 1024;

const EXCLUDED_HEADERS: [&str; 4] = ["authorization", "transfer-encoding", "trailer", "host"];

/// One audited HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub tenant_id: String,
    pub user_email: String,
    pub edge_ids: String,
    pub hostname: String,
    pub request_id: String,
    pub request_method: String,
    pub request_url: String,
    pub request_payload: String,
    pub request_header: String,
    pub response_code: u16,
    pub response_message: String,
    pub response_length: u64,
    pub time_ms: i64,
    pub started_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditLog {
    /// Starts a record for an inbound request. Identity is taken from the
    /// bearer token payload without verifying it.
    pub fn from_request(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        request_id: &str,
        hostname: &str,
    ) -> Self {
        let mut record = AuditLog {
            tenant_id: String::new(),
            user_email: String::new(),
            edge_ids: String::new(),
            hostname: hostname.to_string(),
            request_id: request_id.to_string(),
            request_method: method.to_string(),
            request_url: uri.to_string(),
            request_payload: String::new(),
            request_header: String::new(),
            response_code: 0,
            response_message: String::new(),
            response_length: 0,
            time_ms: 0,
            started_at: Utc::now(),
            created_at: None,
        };

        let mut dump = header_dump(headers);
        if let Some(token) = bearer_token(headers) {
            if let Some(payload) = record.update_from_token(token) {
                dump.push_str(&format!("AuthToken: {}\r\n", payload));
            }
        }
        record.request_header = dump;
        record
    }

    /// Fills identity fields from a JWT payload. Returns the decoded payload.
    pub fn update_from_token(&mut self, token: &str) -> Option<String> {
        let claims = decode_token_payload(token)?;
        let get = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        self.tenant_id = get(claim_keys::TENANT_ID);
        self.user_email = get(claim_keys::EMAIL);
        self.edge_ids = get(claim_keys::EDGE_ID);
        serde_json::to_string(&claims).ok()
    }

    pub fn fill_in_time(&mut self) {
        let now = Utc::now();
        self.time_ms = (now - self.started_at).num_milliseconds();
        self.created_at = Some(now);
    }

    pub fn truncate_for_storage(&mut self) {
        self.request_payload = truncate_string(&self.request_payload, MAX_AUDIT_FIELD_BYTES);
        self.request_header = truncate_string(&self.request_header, MAX_AUDIT_FIELD_BYTES);
        self.response_message = truncate_string(&self.response_message, MAX_AUDIT_FIELD_BYTES);
    }

    /// Collection holding records of the day the request started.
    pub fn collection_name(&self) -> String {
        format!("audit_log_{}", self.started_at.format("%Y%m%d"))
    }

    fn path(&self) -> &str {
        let end = self.request_url.find('?').unwrap_or(self.request_url.len());
        &self.request_url[..end]
    }

    /// Applies the persistence rules once the response is known; login
    /// responses also supply the caller identity.
    pub fn should_persist(&mut self) -> bool {
        let ok = self.response_code == 200;
        let path = self.path().to_string();
        if self.request_method == Method::POST.as_str() {
            if path.ends_with("/login") {
                if !ok {
                    return false;
                }
                let token = serde_json::from_str::<Value>(&self.response_message)
                    .ok()
                    .and_then(|v| v.get("token").and_then(Value::as_str).map(str::to_string));
                if let Some(token) = token {
                    self.update_from_token(&token);
                }
                return true;
            }
            if path.ends_with("/edgebyserialnumber") || path.contains("/edgehandle/") {
                return ok;
            }
        }
        self.response_code != 401
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then_some(token.trim())
        .filter(|t| !t.is_empty())
}

/// Decodes the claims segment of a JWT without checking its signature.
pub fn decode_token_payload(token: &str) -> Option<Map<String, Value>> {
    let segment = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn header_dump(headers: &HeaderMap) -> String {
    let mut names: Vec<&str> = headers
        .keys()
        .map(|name| name.as_str())
        .filter(|name| !EXCLUDED_HEADERS.contains(name))
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut dump = String::new();
    for name in names {
        for value in headers.get_all(name) {
            dump.push_str(name);
            dump.push_str(": ");
            dump.push_str(&String::from_utf8_lossy(value.as_bytes()));
            dump.push_str("\r\n");
        }
    }
    dump
}
