//! Server module for the API starter.
//!
//! Builds the axum router and runs it until Ctrl+C or SIGTERM.
//!
//! # Features
//!
//! - **Sample Endpoints**: `/` welcome text, `/hi` and `/health`
//! - **Request Logging**: every request logged on arrival and completion
//! - **Permissive CORS**: any origin, method and header
//! - **Graceful Shutdown**: in-flight requests finish before exit
//!
//! # Usage
//!
//! ```rust,ignore
//! let registry = Arc::new(LoggerRegistry::from_env());
//! start_server(registry, &env_config, &app_config).await?;
//! ```

pub mod shutdown;

use self::shutdown::ShutdownCoordinator;
use crate::banner::{BannerInfo, print_banner};
use crate::config::AppConfig;
use crate::env::EnvConfig;
use crate::logging::request::log_request;
use crate::logging::{ContextLogger, LogError, LoggerRegistry};
use crate::{log_debug, log_info};
use axum::{Router, extract::State, middleware, routing::get};
use function_name::named;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("logging setup failed: {0}")]
    Logging(#[from] LogError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// State shared by the handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub log: ContextLogger,
    pub service_name: String,
    pub environment: String,
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

pub fn create_router(state: AppState, request_log: ContextLogger) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/hi", get(hi))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(middleware::from_fn_with_state(request_log, log_request))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind, print the banner and serve until a shutdown signal arrives
pub async fn start_server(
    registry: Arc<LoggerRegistry>,
    env: &EnvConfig,
    config: &AppConfig,
) -> Result<(), ServerError> {
    let log = registry.get_logger(Some("server"), None)?;
    let request_log = registry.get_logger(Some("request"), None)?;

    let state = AppState {
        log: log.clone(),
        service_name: registry.service_name().to_string(),
        environment: config.environment.clone(),
    };
    let app = create_router(state, request_log);

    let port = env.port.unwrap_or(config.service_port);
    let listener = tokio::net::TcpListener::bind(SocketAddr::new(env.host, port)).await?;
    let addr = listener.local_addr()?;

    print_banner(&BannerInfo {
        service_name: registry.service_name().to_string(),
        environment: config.environment.clone(),
        host: env.host.to_string(),
        port: addr.port(),
    });
    log.info(format!("Server started on http://{}", addr));

    let shutdown_coordinator = ShutdownCoordinator::new();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_coordinator.wait_for_shutdown_signal().await;
    });

    if let Err(err) = server.await {
        log.error(format!("Server error: {}", err));
        return Err(err.into());
    }

    log.info("Server shutdown complete");
    Ok(())
}

///////////////////////////////////////////////////////////////////////////////
//****                           Handlers                                ****//
///////////////////////////////////////////////////////////////////////////////

#[named]
async fn root(State(state): State<AppState>) -> String {
    log_debug!(state.log, func = function_name!(), "Serving welcome page");
    format!(
        "Welcome to {} ({} environment)",
        state.service_name, state.environment
    )
}

#[named]
async fn hi(State(state): State<AppState>) -> &'static str {
    log_info!(state.log, func = function_name!(), "Saying hello");
    "hello world"
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LoggingSettings, sink::MemorySink, Level, Logger, RecordFormatter};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<MemorySink>) {
        let formatter = Arc::new(RecordFormatter::new("svc"));
        let memory = Arc::new(MemorySink::new(Level::Debug, formatter));
        let mut logger = Logger::new("server", Level::Info);
        logger.add_sink(memory.clone());
        let log = ContextLogger::new(Arc::new(logger));

        let state = AppState {
            log: log.clone(),
            service_name: "orders".to_string(),
            environment: "DEMO".to_string(),
        };
        (create_router(state, log), memory)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_hi_endpoint() {
        let (app, memory) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/hi").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "hello world");

        let lines = memory.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("│ hi                   │"));
        assert!(lines[1].ends_with("│ Saying hello"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _memory) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (app, _memory) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_text(response).await,
            "Welcome to orders (DEMO environment)"
        );
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let (app, _memory) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/hi")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_requests_reach_registry_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LoggerRegistry::new(LoggingSettings {
            log_dir: dir.path().to_path_buf(),
            ..LoggingSettings::default()
        });
        let state = AppState {
            log: registry.get_logger(Some("server"), None).unwrap(),
            service_name: registry.service_name().to_string(),
            environment: "DEMO".to_string(),
        };
        let app = create_router(state, registry.get_logger(Some("request"), None).unwrap());

        app.oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(written.contains("Received GET request for /missing"));
        assert!(written.contains("Completed GET request for /missing"));
    }
}
