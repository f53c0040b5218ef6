//! Test utilities and fixtures for Bookship integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use bookship::crypto::{ClaimKey, ClaimToken};
pub use bookship::db::{init_db, queries, AppState, DbPool};
pub use bookship::email::{Fulfillment, Mailer};
pub use bookship::error::AppError;
pub use bookship::handlers;
pub use bookship::models::*;
pub use bookship::payments::{
    CreateInvoice, Invoice, InvoiceGateway, SettleLocks, WebhookCallback,
};

pub const TEST_CALLBACK_TOKEN: &str = "test_callback_secret";

/// Create a test claim key (deterministic for testing)
pub fn test_claim_key() -> ClaimKey {
    // Fixed 32-byte key - ONLY for testing!
    ClaimKey::from_bytes([7u8; 32])
}

/// In-memory pool. Size 1 so every checkout sees the same database.
pub fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

/// Fake invoice gateway recording calls, so tests can assert the engine
/// never talks to the gateway on rejected requests.
#[derive(Default)]
pub struct FakeGateway {
    invoices: Mutex<HashMap<String, Invoice>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub fail_create: AtomicBool,
}

impl FakeGateway {
    pub fn set_invoice_status(&self, invoice_id: &str, status: &str) {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .get_mut(invoice_id)
            .expect("unknown invoice id in test");
        invoice.status = status.to_string();
    }

    pub fn insert_invoice(&self, invoice: Invoice) {
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
    }
}

#[async_trait]
impl InvoiceGateway for FakeGateway {
    async fn create_invoice(
        &self,
        spec: &CreateInvoice,
    ) -> bookship::error::Result<Invoice> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::PaymentGateway("gateway down (test)".into()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let invoice = Invoice {
            id: format!("inv_{}", n),
            external_id: spec.external_id.clone(),
            status: "PENDING".to_string(),
            amount: spec.amount,
            invoice_url: format!("https://checkout.test/inv_{}", n),
            items: spec.items.clone(),
        };
        self.insert_invoice(invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &str) -> bookship::error::Result<Invoice> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.invoices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Invoice not found with id {}", id)))
    }
}

/// Fake mail transport recording every fulfillment it was asked to send.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<Fulfillment>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_fulfillment(
        &self,
        fulfillment: &Fulfillment,
    ) -> bookship::error::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("mail transport down (test)".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(fulfillment.clone());
        Ok(format!("msg_{}", sent.len()))
    }
}

/// AppState wired with fakes, plus handles to inspect them.
pub struct TestContext {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<FakeMailer>,
}

pub fn test_context() -> TestContext {
    test_context_with_zip_dir("_zip")
}

pub fn test_context_with_zip_dir(zip_dir: &str) -> TestContext {
    let gateway = Arc::new(FakeGateway::default());
    let mailer = Arc::new(FakeMailer::default());

    let state = AppState {
        db: test_pool(),
        gateway: gateway.clone(),
        mailer: mailer.clone(),
        claim_key: test_claim_key(),
        callback_token: TEST_CALLBACK_TOKEN.to_string(),
        server_origin: "http://localhost:3000".to_string(),
        frontend_origin: "http://localhost:5173".to_string(),
        zip_dir: zip_dir.to_string(),
        settle_locks: Arc::new(SettleLocks::default()),
    };

    TestContext {
        state,
        gateway,
        mailer,
    }
}

/// Router with every endpoint, as main.rs builds it (minus static files).
pub fn test_app(state: AppState) -> Router {
    handlers::router().with_state(state)
}

/// Create a test product
pub fn create_test_product(conn: &Connection, title: &str, discount_price: i64) -> Product {
    let input = CreateProduct {
        title: title.to_string(),
        description: format!("{} - test edition", title),
        original_price: discount_price * 2,
        discount_price,
        image: "cover.png".to_string(),
        zip_path: "book.zip".to_string(),
        is_offer: false,
    };
    queries::create_product(conn, &input).expect("Failed to create test product")
}

/// Create a PENDING transaction for a product
pub fn create_test_transaction(conn: &Connection, product_id: i64, email: &str) -> Transaction {
    let input = CreateTransaction {
        product_id,
        name: "Test Buyer".to_string(),
        email: email.to_string(),
        phone: "081234567890".to_string(),
    };
    queries::create_transaction(conn, &input).expect("Failed to create test transaction")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
