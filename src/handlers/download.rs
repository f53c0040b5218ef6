//! Claim-link downloads.
//!
//! The token in the URL is the encrypted claim minted at fulfillment time.
//! Decoding success only proves the token is genuine; the product is
//! re-validated against the catalog before anything is served.

use axum::{
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::get,
    extract::State,
    Router,
};

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::Path;

pub async fn download_archive(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    let claim = state.claim_key.open_claim(&token)?;

    let product = {
        let conn = state.db.get()?;
        queries::get_product_by_id(&conn, claim.product_id)?
            .or_not_found(format!("Product not found with id {}", claim.product_id))?
    };

    let path = std::path::Path::new(&state.zip_dir).join(&product.zip_path);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::warn!(
            product_id = product.id,
            path = %path.display(),
            error = %e,
            "Product archive missing from disk"
        );
        AppError::NotFound("File not found".into())
    })?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", product.zip_path),
        ),
        (
            HeaderName::from_static("x-filename"),
            product.zip_path.clone(),
        ),
    ];

    Ok((headers, bytes).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/downloads/{token}", get(download_archive))
}
