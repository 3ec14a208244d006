//! # HTTP server for label printing
//!
//! ## Routes
//!
//! - `GET /` redirects to `/static/index.html`
//! - `GET /static/*` serves the front-end files
//! - `POST /print` with `{"content": "<text>"}` prints one label and answers
//!   `{"status": "Printed", "text": "<text>"}`, or `{"error": "<message>"}`
//!   with a non-2xx status
//!
//! ## Usage
//!
//! ```bash
//! labelprint serve --listen 0.0.0.0:8000 --static-dir static
//! ```

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tower_http::services::ServeDir;

use crate::{backend::PrintBackend, error::Error};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8000")
    pub listen_addr: String,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Longest accepted text, in characters
    pub max_text_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8000".to_string(),
            static_dir: PathBuf::from("static"),
            max_text_len: crate::DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub backend: Arc<dyn PrintBackend>,
    pub max_text_len: usize,
}

/// Body of `POST /print`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrintRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PrintResponse {
    pub status: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Builds the application router.
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/print", post(print_handler))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(config: ServerConfig, backend: Arc<dyn PrintBackend>) -> Result<(), Error> {
    info!("Printing to {}", backend.describe());

    let state = Arc::new(AppState {
        backend,
        max_text_len: config.max_text_len,
    });
    let app = router(state, &config);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Listening on http://{}/", config.listen_addr);
    info!("Serving front-end from {}", config.static_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Handle GET / - send the browser to the front-end.
async fn index_handler() -> Redirect {
    Redirect::temporary("/static/index.html")
}

/// Handle POST /print - print one label.
async fn print_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PrintRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    let len = request.content.chars().count();
    if len > state.max_text_len {
        let err = Error::TextTooLong {
            len,
            max: state.max_text_len,
        };
        return error_response(status_for(&err), err.to_string());
    }

    // Rendering and device I/O block, run them off the async workers
    let backend = state.backend.clone();
    let text = request.content.clone();
    let result = tokio::task::spawn_blocking(move || backend.print_text(&text)).await;

    match result {
        Ok(Ok(())) => {
            info!("Printed {} characters", len);
            (
                StatusCode::OK,
                Json(PrintResponse {
                    status: "Printed".to_string(),
                    text: request.content,
                }),
            )
                .into_response()
        }
        Ok(Err(err)) => {
            error!("Print failed: {}", err);
            error_response(status_for(&err), err.to_string())
        }
        Err(err) => {
            error!("Print task failed: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Task error: {}", err),
            )
        }
    }
}

/// HTTP status reported for a failed print.
pub fn status_for(err: &Error) -> StatusCode {
    if err.is_client_error() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        match err {
            Error::FontUnavailable | Error::Image(_) | Error::InvalidConfig(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PortStatus;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            status_for(&Error::TextTooLong { len: 600, max: 512 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&Error::DeviceNotFound {
                vendor_id: 0x04F9,
                product_id: 0x209C
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::NotReady(PortStatus::from_byte(0x28))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&Error::NoPrinters), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&Error::MissingEndpoint), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::UsbError(rusb::Error::Pipe)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::FontUnavailable),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
