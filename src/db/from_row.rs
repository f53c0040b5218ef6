//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse the status column into the enum, converting unexpected values to
/// rusqlite errors instead of panicking (the CHECK constraint makes this
/// unreachable short of manual edits or corruption).
fn parse_status(row: &Row, col: usize) -> rusqlite::Result<TransactionStatus> {
    let raw: String = row.get(col)?;
    TransactionStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, "status".to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PRODUCT_COLS: &str = "id, title, description, original_price, discount_price, image, zip_path, is_offer, created_at, updated_at";

pub const TRANSACTION_COLS: &str = "id, product_id, name, email, phone, status, external_id, invoice_id, invoice_url, created_at, updated_at";

/// Transaction joined with its (possibly deleted) product.
pub const TRANSACTION_ROW_COLS: &str = "t.id, t.name, t.email, t.phone, t.status, t.external_id, t.invoice_id, t.invoice_url, t.created_at, t.updated_at, p.id, p.title, p.image, p.original_price, p.discount_price, p.description";

// ============ FromRow Implementations ============

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            original_price: row.get(3)?,
            discount_price: row.get(4)?,
            image: row.get(5)?,
            zip_path: row.get(6)?,
            is_offer: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            product_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            status: parse_status(row, 5)?,
            external_id: row.get(6)?,
            invoice_id: row.get(7)?,
            invoice_url: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for TransactionRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        // LEFT JOIN: all product columns are NULL when the product is gone.
        let product = match row.get::<_, Option<i64>>(10)? {
            Some(id) => Some(ProductSummary {
                id,
                title: row.get(11)?,
                image: row.get(12)?,
                original_price: row.get(13)?,
                discount_price: row.get(14)?,
                description: row.get(15)?,
            }),
            None => None,
        };
        Ok(TransactionRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            status: parse_status(row, 4)?,
            external_id: row.get(5)?,
            invoice_id: row.get(6)?,
            invoice_url: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            product,
        })
    }
}
