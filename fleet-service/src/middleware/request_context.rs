//! Audit capture around every API request: body limits, payload redaction,
//! response capture and out-of-band persistence of the audit record.

use std::sync::OnceLock;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use regex::Regex;
use service_core::error::AppError;
use service_core::middleware::{RequestId, REQUEST_ID_HEADER};

use crate::config::AuditConfig;
use crate::models::AuditLog;
use crate::services::metrics::record_audit;
use crate::services::AuditWriter;
use crate::utils::gzip::body_text;
use crate::utils::redact_json;
use crate::AppState;

fn bulk_upload_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r".*/mlmodels/[^/]+/versions.*").expect("bulk upload pattern is valid")
    })
}

/// How the pipeline treats one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestClass {
    /// Reads are audited only when read auditing is enabled.
    pub read: bool,
    /// Bulk uploads get the larger body limit and are streamed, never buffered.
    pub bulk: bool,
    /// Responses of these endpoints carry secrets and are never captured.
    pub skip_capture: bool,
    /// Payloads are logged at trace instead of debug.
    pub quiet: bool,
}

impl RequestClass {
    pub fn classify(method: &Method, path: &str, audit: &AuditConfig) -> Self {
        let events = path.ends_with("/events");
        let read = *method == Method::GET
            || (*method == Method::POST && events)
            || (*method == Method::PUT && events && !audit.enable_audit_log_of_put_event);
        Self {
            read,
            bulk: bulk_upload_pattern().is_match(path),
            skip_capture: path.contains("/edgehandle/"),
            quiet: (*method == Method::PUT && events)
                || (*method == Method::POST && path.ends_with("/helm/template")),
        }
    }

    fn reads_body(&self, method: &Method) -> bool {
        *method != Method::GET && !self.bulk
    }
}

pub async fn request_context_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = &state.config;
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .or_else(|| {
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let method = req.method().clone();
    let class = RequestClass::classify(&method, req.uri().path(), &config.audit);
    let limit = if class.bulk {
        config.limits.bulk_payload_max_bytes
    } else {
        config.limits.default_payload_max_bytes
    };
    if declared_length(req.headers()).is_some_and(|len| len > limit as u64) {
        return Err(payload_too_large(limit));
    }

    let audited = !config.audit.disable_audit_log
        && (!class.read || config.audit.enable_audit_log_of_read_req);
    let mut record = audited.then(|| {
        AuditLog::from_request(
            &method,
            req.uri(),
            req.headers(),
            &request_id,
            &config.hostname,
        )
    });

    let (parts, body) = req.into_parts();
    let body = if class.reads_body(&method) {
        let bytes = read_limited(body, limit).await?;
        let payload = redact_json(
            &String::from_utf8_lossy(&bytes),
            config.limits.log_payload_max_fields,
        );
        if class.quiet {
            tracing::trace!(request_id = %request_id, payload = %payload, "Request payload");
        } else {
            tracing::debug!(request_id = %request_id, payload = %payload, "Request payload");
        }
        if let Some(record) = record.as_mut() {
            record.request_payload = payload;
        }
        Body::from(bytes)
    } else {
        Body::new(Limited::new(body, limit))
    };

    let response = next.run(Request::from_parts(parts, body)).await;

    let Some(mut record) = record else {
        return Ok(response);
    };

    record.response_code = response.status().as_u16();
    let capture = (!class.read || response.status() != StatusCode::OK) && !class.skip_capture;
    let mut tap = AuditTap::new(record, state.audit.clone(), capture);
    let (parts, body) = response.into_parts();
    let body = body.map_frame(move |frame| {
        if let Some(data) = frame.data_ref() {
            tap.observe(data);
        }
        frame
    });
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Watches a response body as it streams out. The audit record is completed
/// and submitted when the body is dropped, after the last frame was sent.
struct AuditTap {
    record: Option<AuditLog>,
    writer: AuditWriter,
    captured: Option<Vec<u8>>,
    length: u64,
}

impl AuditTap {
    fn new(record: AuditLog, writer: AuditWriter, capture: bool) -> Self {
        Self {
            record: Some(record),
            writer,
            captured: capture.then(Vec::new),
            length: 0,
        }
    }

    fn observe(&mut self, data: &Bytes) {
        self.length += data.len() as u64;
        if let Some(buf) = self.captured.as_mut() {
            buf.extend_from_slice(data);
        }
    }
}

impl Drop for AuditTap {
    fn drop(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        record.response_length = self.length;
        if let Some(buf) = self.captured.take() {
            record.response_message = body_text(&buf);
        }
        if record.should_persist() {
            record.fill_in_time();
            self.writer.submit(record);
        } else {
            record_audit("suppressed");
        }
    }
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, AppError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(payload_too_large(limit)),
        Err(e) => Err(AppError::BadRequest(format!("failed to read request body: {}", e))),
    }
}

fn payload_too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!("request body exceeds {} bytes", limit))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit() -> AuditConfig {
        AuditConfig::default()
    }

    #[test]
    fn gets_and_event_posts_are_reads() {
        let cfg = audit();
        assert!(RequestClass::classify(&Method::GET, "/v1.0/projects", &cfg).read);
        assert!(RequestClass::classify(&Method::POST, "/v1.0/edges/e1/events", &cfg).read);
        assert!(!RequestClass::classify(&Method::POST, "/v1.0/projects", &cfg).read);
    }

    #[test]
    fn put_events_are_writes_only_when_enabled() {
        let mut cfg = audit();
        let class = RequestClass::classify(&Method::PUT, "/v1.0/events", &cfg);
        assert!(class.read);
        assert!(class.quiet);

        cfg.enable_audit_log_of_put_event = true;
        assert!(!RequestClass::classify(&Method::PUT, "/v1.0/events", &cfg).read);
    }

    #[test]
    fn model_version_uploads_are_bulk() {
        let class =
            RequestClass::classify(&Method::POST, "/v1.0/mlmodels/m1/versions", &audit());
        assert!(class.bulk);
        assert!(!class.reads_body(&Method::POST));
        assert!(!RequestClass::classify(&Method::POST, "/v1.0/mlmodels", &audit()).bulk);
    }

    #[test]
    fn edge_handle_responses_are_not_captured() {
        let class = RequestClass::classify(&Method::POST, "/v1.0/edgehandle/e1", &audit());
        assert!(class.skip_capture);
        assert!(
            RequestClass::classify(&Method::POST, "/v1.0/helm/template", &audit()).quiet
        );
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let err = read_limited(Body::from(vec![0u8; 16]), 8).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));

        let ok = read_limited(Body::from("abc"), 8).await.unwrap();
        assert_eq!(&ok[..], b"abc");
    }
}
