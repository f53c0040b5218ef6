//! Purchase creation and the transaction reporting API.

use axum::{
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    extract::State,
    Router,
};
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateTransaction, TransactionFilters, TransactionRow};
use crate::pagination::{PageMeta, PageQuery};
use crate::payments::{self, PurchaseReceipt};

/// List envelope the admin frontend consumes.
#[derive(Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ItemResponse<T> {
    pub data: T,
    pub message: &'static str,
}

/// Start a purchase: persist the transaction and open a gateway invoice.
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransaction>,
) -> Result<(StatusCode, Json<PurchaseReceipt>)> {
    let receipt = payments::create_purchase(&state, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Combined page + date-range query string. Kept flat: serde_urlencoded
/// does not handle flattened structs with numeric fields.
#[derive(Debug, serde::Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl ListQuery {
    fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    fn filters(&self) -> TransactionFilters {
        TransactionFilters {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        }
    }
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<TransactionRow>>> {
    let range = query.filters().range()?;
    let paging = query.page_query();
    let (page, limit) = (paging.page(), paging.limit());

    let conn = state.db.get()?;
    let (rows, total) = queries::list_transactions_paginated(&conn, range, limit, paging.offset())?;

    Ok(Json(ListResponse {
        data: rows,
        meta: PageMeta::new(page, limit, total),
        message: "Successfully",
    }))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ItemResponse<TransactionRow>>> {
    let conn = state.db.get()?;
    let row = queries::get_transaction_with_product(&conn, id)?
        .or_not_found(format!("Transaction not found with id {}", id))?;

    Ok(Json(ItemResponse {
        data: row,
        message: "Successfully",
    }))
}

/// Administrative delete; no cascading effects.
pub async fn remove_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_transaction(&conn, id)? {
        return Err(AppError::NotFound(format!(
            "Transaction not found with id {}",
            id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

const EXPORT_HEADER: &[&str] = &[
    "date",
    "name",
    "email",
    "phone",
    "status",
    "product",
    "price",
    "invoice_url",
];

fn format_date(timestamp: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn render_csv(rows: &[TransactionRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_HEADER)
        .map_err(|e| AppError::Internal(format!("CSV error: {}", e)))?;

    for row in rows {
        let (product_title, product_price) = match &row.product {
            Some(p) => (p.title.clone(), p.discount_price.to_string()),
            None => (String::new(), String::new()),
        };
        writer
            .write_record(&[
                format_date(row.created_at),
                row.name.clone(),
                row.email.clone(),
                row.phone.clone(),
                row.status.to_string(),
                product_title,
                product_price,
                row.invoice_url.clone().unwrap_or_default(),
            ])
            .map_err(|e| AppError::Internal(format!("CSV error: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV error: {}", e)))
}

/// Export the (optionally date-filtered) transaction log as CSV.
/// The response is marked uncacheable: it contains buyer contact data.
pub async fn export_transactions(
    State(state): State<AppState>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Response> {
    let range = filters.range()?;

    let rows = {
        let conn = state.db.get()?;
        queries::list_transactions_for_export(&conn, range)?
    };
    let csv_data = render_csv(&rows)?;

    let headers = [
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=transaction-report.csv".to_string(),
        ),
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CACHE_CONTROL,
            "no-store, no-cache, must-revalidate, proxy-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
        (
            HeaderName::from_static("surrogate-control"),
            "no-store".to_string(),
        ),
    ];

    Ok((headers, csv_data).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/transactions", get(list_transactions))
        .route("/transactions/export", get(export_transactions))
        .route("/transactions/{id}", get(get_transaction))
        .route("/transactions/{id}", delete(remove_transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductSummary, TransactionStatus};

    fn sample_row(product: Option<ProductSummary>) -> TransactionRow {
        TransactionRow {
            id: 1,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            phone: "0812".into(),
            status: TransactionStatus::Settled,
            product,
            external_id: Some("trx_1_1".into()),
            invoice_id: Some("inv_1".into()),
            invoice_url: Some("https://checkout.example/inv_1".into()),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_render_csv_includes_header_and_rows() {
        let rows = vec![sample_row(Some(ProductSummary {
            id: 1,
            title: "Rust in Anger".into(),
            image: "cover.png".into(),
            original_price: 2000,
            discount_price: 1000,
            description: "d".into(),
        }))];
        let csv = render_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,name,email,phone,status,product,price,invoice_url"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("Rust in Anger"));
        assert!(row.contains("SETTLED"));
        assert!(row.contains("1000"));
    }

    #[test]
    fn test_render_csv_empty_keeps_header() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(
            csv.trim_end(),
            "date,name,email,phone,status,product,price,invoice_url"
        );
    }

    #[test]
    fn test_render_csv_survives_missing_product() {
        let csv = render_csv(&[sample_row(None)]).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
