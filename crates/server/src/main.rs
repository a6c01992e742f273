use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{ErrorBody, QrResponse, ERROR_GENERATION_FAILED, ERROR_TEXT_REQUIRED},
    style::QrStyle,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;

use config::load_settings;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    style: QrStyle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let state = AppState {
        style: QrStyle::default(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "qr encoding service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/qr", post(generate_qr))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `POST /api/qr` with `{ "text": "<string>" }`.
///
/// The body is parsed by hand so the failure body stays on the wire
/// contract: a missing, non-string, or empty `text` (and malformed JSON)
/// yields `400 {"error": "Text is required"}` rather than a framework
/// rejection shape.
async fn generate_qr(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<QrResponse>, (StatusCode, Json<ErrorBody>)> {
    let text = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("text")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .filter(|text| !text.is_empty());

    let Some(text) = text else {
        return Err(reject(ApiError::validation(ERROR_TEXT_REQUIRED)));
    };

    match encoder::encode_data_url(&text, &state.style) {
        Ok(qr_code) => Ok(Json(QrResponse { qr_code })),
        Err(err) if err.is_invalid_input() => {
            Err(reject(ApiError::validation(ERROR_TEXT_REQUIRED)))
        }
        Err(err) => {
            error!(%err, "qr encoding failed");
            Err(reject(ApiError::internal(ERROR_GENERATION_FAILED)))
        }
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ErrorBody>) {
    let status = match error.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody {
        error: error.message,
    }))
}
