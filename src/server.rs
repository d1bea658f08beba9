use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::job::{self, QuizRequest};

pub async fn serve(config: Arc<Config>) -> Result<()> {
    config
        .secret
        .as_deref()
        .context("QUIZ_SECRET environment variable must be set to serve")?;

    let app = router(config.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

pub fn router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .with_state(config)
}

/// Accept or reject synchronously; all real work happens on a detached task
/// whose failures cannot reach this response path.
async fn handle_webhook(
    State(config): State<Arc<Config>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let request = match parse_request(&body) {
        Ok(r) => r,
        Err(message) => {
            warn!("rejecting webhook: {}", message);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })));
        }
    };

    if config.secret.as_deref() != Some(request.secret.as_str()) {
        warn!("rejecting webhook: secret mismatch");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "invalid secret" })),
        );
    }

    tokio::spawn(job::run(config.clone(), request));
    (StatusCode::OK, Json(json!({ "status": "accepted" })))
}

/// The body must be a JSON object with string fields email, secret, url.
pub fn parse_request(body: &Value) -> Result<QuizRequest, &'static str> {
    let object = body.as_object().ok_or("body must be a JSON object")?;
    let field = |name: &str, missing: &'static str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(missing)
    };
    Ok(QuizRequest {
        email: field("email", "missing string field: email")?,
        secret: field("secret", "missing string field: secret")?,
        url: field("url", "missing string field: url")?,
    })
}
