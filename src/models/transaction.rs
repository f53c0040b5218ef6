use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ProductSummary;

/// One purchase attempt. `external_id` correlates the row with its gateway
/// invoice and stays NULL until the invoice is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: TransactionStatus,
    pub external_id: Option<String>,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Payment state of a transaction.
///
/// PENDING is the only non-terminal state; SETTLED and FAILED are terminal
/// and never regress (the store enforces this with conditional updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Settled,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Settled => "SETTLED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SETTLED" => Some(Self::Settled),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Buyer-submitted purchase request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    pub product_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CreateTransaction {
    pub fn validate(&self) -> Result<()> {
        if self.product_id <= 0 {
            return Err(AppError::Validation("productId must be positive".into()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("email must not be empty".into()));
        }
        // Cheap shape check; delivery failures catch the rest.
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(AppError::Validation("email is not well-formed".into()));
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(AppError::Validation("phone must not be empty".into()));
        }
        if !phone
            .chars()
            .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
        {
            return Err(AppError::Validation("phone contains invalid characters".into()));
        }
        Ok(())
    }
}

/// Partial update for a transaction row. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone)]
pub struct UpdateTransaction {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<TransactionStatus>,
    pub external_id: Option<String>,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
}

/// Date-range filter for listings and exports.
///
/// Dates arrive as `YYYY-MM-DD`; the range is inclusive, so the end date is
/// extended by one day when converted to timestamps. Both bounds must be
/// present for the filter to apply.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransactionFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TransactionFilters {
    /// Resolve to `(start, end)` Unix timestamps, or None when either bound
    /// is absent. Fails with a validation error on unparseable dates.
    pub fn range(&self) -> Result<Option<(i64, i64)>> {
        let (Some(start), Some(end)) = (self.start_date.as_deref(), self.end_date.as_deref())
        else {
            return Ok(None);
        };

        let parse = |s: &str| -> Result<chrono::NaiveDate> {
            s.parse::<chrono::NaiveDate>()
                .map_err(|_| AppError::Validation(format!("Invalid date: {}", s)))
        };

        let start_ts = parse(start)?
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
            .timestamp();
        let end_ts = (parse(end)? + chrono::Days::new(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
            .timestamp();

        Ok(Some((start_ts, end_ts)))
    }
}

/// Transaction row joined with its product for listings. The join is LEFT:
/// a product deleted after purchase leaves `product` empty rather than
/// hiding the transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: TransactionStatus,
    pub product: Option<ProductSummary>,
    pub external_id: Option<String>,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
