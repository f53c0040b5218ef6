use axum::{extract::State, http::HeaderMap, routing::post, Router};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::payments::{self, WebhookCallback, WebhookReply};

/// Gateway invoice callback.
///
/// All authentication and reconciliation logic lives in the lifecycle
/// engine; this handler only peels the shared-secret header off the
/// request.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(callback): Json<WebhookCallback>,
) -> Result<Json<WebhookReply>> {
    let token = match headers.get("x-callback-token") {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::Forbidden("Token invalid".into()))?,
        ),
        None => None,
    };

    let reply = payments::process_webhook(&state, token, &callback).await?;
    Ok(Json(reply))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(handle_payment_webhook))
}
