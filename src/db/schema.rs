use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- E-book catalog. Catalog management happens in a separate admin
        -- service; this schema only needs what purchases and downloads read.
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            original_price INTEGER NOT NULL,
            discount_price INTEGER NOT NULL,
            image TEXT NOT NULL,
            zip_path TEXT NOT NULL,
            is_offer INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_offer ON products(is_offer);

        -- Purchase attempts. external_id is the gateway correlation key:
        -- NULL until invoice creation, unique forever after (SQLite UNIQUE
        -- permits multiple NULLs). Status only ever moves PENDING ->
        -- SETTLED | FAILED via conditional updates.
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'SETTLED', 'FAILED')),
            external_id TEXT UNIQUE,
            invoice_id TEXT,
            invoice_url TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_product ON transactions(product_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at DESC);
        "#,
    )?;
    Ok(())
}
