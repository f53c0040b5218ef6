mod schema;
pub mod from_row;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::crypto::ClaimKey;
use crate::email::Mailer;
use crate::payments::{InvoiceGateway, SettleLocks};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state: the database pool plus every external collaborator
/// the lifecycle engine needs, injected at startup so tests can substitute
/// fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment gateway client (invoice creation and lookup)
    pub gateway: Arc<dyn InvoiceGateway>,
    /// Outbound fulfillment mail transport
    pub mailer: Arc<dyn Mailer>,
    /// Master key for claim-link tokens
    pub claim_key: ClaimKey,
    /// Shared secret expected in the x-callback-token webhook header
    pub callback_token: String,
    /// Public origin of this server (image URLs)
    pub server_origin: String,
    /// Frontend origin (claim links)
    pub frontend_origin: String,
    /// Directory holding product zip archives
    pub zip_dir: String,
    /// Per-externalId locks serializing webhook reconciliation
    pub settle_locks: Arc<SettleLocks>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
