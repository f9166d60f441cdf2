//! HTTP server setup and the request handler.
//!
//! # Responsibilities
//! - Create the Axum router (any method, any path → one handler)
//! - Capture each request and log it on the info channel
//! - Map capture failures to 500 and log them on the error channel
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::LoggerdConfig;
use crate::fields;
use crate::http::request::RequestRecord;
use crate::observability::{metrics, Loggers, Severity};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub loggers: Arc<Loggers>,
    pub max_body_bytes: usize,
}

/// HTTP server for loggerd.
pub struct HttpServer {
    router: Router,
    config: LoggerdConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and loggers.
    pub fn new(config: LoggerdConfig, loggers: Arc<Loggers>) -> Self {
        let state = AppState {
            loggers,
            max_body_bytes: config.listener.max_body_bytes,
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(handle))
            .route("/", any(handle))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the handler without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &LoggerdConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Capture the request, log it, answer 204. Capture failures answer 500.
pub async fn handle(State(state): State<AppState>, request: Request<Body>) -> StatusCode {
    let method = request.method().to_string();
    let uri = request.uri().to_string();

    let record = match RequestRecord::extract(request, state.max_body_bytes).await {
        Ok(record) => record,
        Err(e) => {
            return fail(&state, "Failed to read request body", method, uri, e.to_string()).await;
        }
    };

    let fields = match record.to_fields() {
        Ok(fields) => fields,
        Err(e) => {
            return fail(&state, "Failed to marshal request", method, uri, e.to_string()).await;
        }
    };

    state
        .loggers
        .info
        .log(Severity::Info, "Received request", fields)
        .await;

    metrics::record_request(StatusCode::NO_CONTENT.as_u16());
    StatusCode::NO_CONTENT
}

async fn fail(state: &AppState, message: &str, method: String, uri: String, error: String) -> StatusCode {
    state
        .loggers
        .error
        .log(
            Severity::Error,
            message,
            fields!("method" => method, "request_uri" => uri, "error" => error),
        )
        .await;

    metrics::record_request(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    StatusCode::INTERNAL_SERVER_ERROR
}
