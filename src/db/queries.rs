use chrono::Utc;
use rusqlite::{params, types::Value, Connection};

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, PRODUCT_COLS, TRANSACTION_COLS, TRANSACTION_ROW_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query for efficiency.
struct UpdateBuilder {
    table: &'static str,
    id: i64,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Products ============

/// Insert a product. Catalog management is handled by a separate admin
/// service; this exists for dev seeding and tests.
pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let now = now();
    conn.execute(
        "INSERT INTO products (title, description, original_price, discount_price, image, zip_path, is_offer, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &input.title,
            &input.description,
            input.original_price,
            input.discount_price,
            &input.image,
            &input.zip_path,
            input.is_offer,
            now,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();

    Ok(Product {
        id,
        title: input.title.clone(),
        description: input.description.clone(),
        original_price: input.original_price,
        discount_price: input.discount_price,
        image: input.image.clone(),
        zip_path: input.zip_path.clone(),
        is_offer: input.is_offer,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: i64) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

// ============ Transactions ============

/// Insert a new PENDING transaction. The gateway correlation fields stay
/// NULL until invoice creation assigns them.
pub fn create_transaction(conn: &Connection, input: &CreateTransaction) -> Result<Transaction> {
    let now = now();
    conn.execute(
        "INSERT INTO transactions (product_id, name, email, phone, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5, ?6)",
        params![
            input.product_id,
            &input.name,
            &input.email,
            &input.phone,
            now,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();

    Ok(Transaction {
        id,
        product_id: input.product_id,
        name: input.name.clone(),
        email: input.email.clone(),
        phone: input.phone.clone(),
        status: TransactionStatus::Pending,
        external_id: None,
        invoice_id: None,
        invoice_url: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_transaction_by_id(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLS),
        &[&id],
    )
}

pub fn get_transaction_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE external_id = ?1",
            TRANSACTION_COLS
        ),
        &[&external_id],
    )
}

/// Transaction with its product summary for the reporting API.
pub fn get_transaction_with_product(conn: &Connection, id: i64) -> Result<Option<TransactionRow>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM transactions t LEFT JOIN products p ON t.product_id = p.id WHERE t.id = ?1",
            TRANSACTION_ROW_COLS
        ),
        &[&id],
    )
}

/// Apply a partial update. Returns false when the id does not exist (or no
/// fields were set).
pub fn update_transaction(conn: &Connection, id: i64, input: &UpdateTransaction) -> Result<bool> {
    UpdateBuilder::new("transactions", id)
        .set_opt("name", input.name.clone())
        .set_opt("email", input.email.clone())
        .set_opt("phone", input.phone.clone())
        .set_opt("status", input.status.map(|s| s.as_str().to_string()))
        .set_opt("external_id", input.external_id.clone())
        .set_opt("invoice_id", input.invoice_id.clone())
        .set_opt("invoice_url", input.invoice_url.clone())
        .execute(conn)
}

/// Atomically settle a PENDING transaction, returning whether this call won.
///
/// The compare-and-swap keeps concurrent webhook deliveries for the same
/// external id from settling twice, and keeps a FAILED row FAILED.
pub fn try_settle_transaction(conn: &Connection, external_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE transactions SET status = 'SETTLED', updated_at = ?1
         WHERE external_id = ?2 AND status = 'PENDING'",
        params![now(), external_id],
    )?;
    Ok(affected > 0)
}

/// Atomically fail a PENDING transaction (expired invoice). Terminal rows
/// are left untouched.
pub fn try_fail_transaction(conn: &Connection, external_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE transactions SET status = 'FAILED', updated_at = ?1
         WHERE external_id = ?2 AND status = 'PENDING'",
        params![now(), external_id],
    )?;
    Ok(affected > 0)
}

/// Administrative delete. Returns false when the id does not exist.
pub fn delete_transaction(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Newest-first page of transactions with product summaries, plus the
/// unpaged row count for the meta block. `range` is a half-open
/// `[start, end)` created_at filter.
pub fn list_transactions_paginated(
    conn: &Connection,
    range: Option<(i64, i64)>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<TransactionRow>, i64)> {
    let (where_clause, mut bounds): (&str, Vec<i64>) = match range {
        Some((start, end)) => (
            "WHERE t.created_at >= ?1 AND t.created_at < ?2",
            vec![start, end],
        ),
        None => ("", Vec::new()),
    };

    let sql = format!(
        "SELECT {} FROM transactions t LEFT JOIN products p ON t.product_id = p.id
         {} ORDER BY t.created_at DESC, t.id DESC LIMIT {} OFFSET {}",
        TRANSACTION_ROW_COLS, where_clause, limit, offset
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        bounds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
    let rows = query_all(conn, &sql, &params)?;

    let count_sql = format!(
        "SELECT COUNT(*) FROM transactions t {}",
        where_clause
    );
    let total: i64 = conn.query_row(&count_sql, rusqlite::params_from_iter(bounds.drain(..)), |r| {
        r.get(0)
    })?;

    Ok((rows, total))
}

/// All transactions in the range, newest first, for CSV export.
pub fn list_transactions_for_export(
    conn: &Connection,
    range: Option<(i64, i64)>,
) -> Result<Vec<TransactionRow>> {
    let (where_clause, bounds): (&str, Vec<i64>) = match range {
        Some((start, end)) => (
            "WHERE t.created_at >= ?1 AND t.created_at < ?2",
            vec![start, end],
        ),
        None => ("", Vec::new()),
    };

    let sql = format!(
        "SELECT {} FROM transactions t LEFT JOIN products p ON t.product_id = p.id
         {} ORDER BY t.created_at DESC, t.id DESC",
        TRANSACTION_ROW_COLS, where_clause
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        bounds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
    query_all(conn, &sql, &params)
}
