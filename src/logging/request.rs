//! Request logging middleware
//!
//! Logs every request on arrival and on completion with its duration. Server
//! errors are reported at ERROR level. All events of one request share a
//! `request_id`, which is also returned in the `x-request-id` header.
//!
//! ```rust,ignore
//! let request_log = registry.get_logger(Some("request"), None)?;
//! let app = Router::new()
//!     .route("/hi", get(hi))
//!     .layer(middleware::from_fn_with_state(request_log, log_request));
//! ```

use super::event::{Callsite, Level};
use super::registry::ContextLogger;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn log_request(
    State(log): State<ContextLogger>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let log = log.with_field("request_id", request_id.clone());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    emit(&log, Level::Info, line!(), format!("Received {} request for {}", method, path));

    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();

    if status.is_server_error() {
        emit(
            &log,
            Level::Error,
            line!(),
            format!(
                "Failed {} request for {} in {:.2}ms: {}",
                method, path, elapsed_ms, status
            ),
        );
    } else {
        emit(
            &log,
            Level::Info,
            line!(),
            format!("Completed {} request for {} in {:.2}ms", method, path, elapsed_ms),
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn emit(log: &ContextLogger, level: Level, line: u32, message: String) {
    let callsite = Callsite::from_module_path(module_path!(), "log_request", line);
    log.report(log.log(level, callsite, message));
}
