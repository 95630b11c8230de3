use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use std::any::Any;
use std::backtrace::Backtrace;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::{codes, ErrorBody};

/// Converts a handler panic into the standard JSON 500 body.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(
        panic = %detail,
        backtrace = %Backtrace::force_capture(),
        "Recovered from handler panic"
    );

    let body = ErrorBody {
        status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        error_code: codes::UNCLASSIFIED,
        message: "internal server error".to_string(),
    };
    let body = serde_json::to_vec(&body).unwrap_or_default();

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

pub fn panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response<Body>> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response<Body>)
}
