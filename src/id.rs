//! Gateway correlation id generation.
//!
//! Every invoice handed to the payment gateway carries an external id in
//! the form `trx_{unix_millis}_{transaction_id}`. The store-assigned
//! transaction id makes the value unique even when two purchases land in
//! the same millisecond, and keeps buyer contact details out of the
//! correlation key.

use chrono::Utc;

const EXTERNAL_ID_PREFIX: &str = "trx_";

/// Generate the external id for a freshly created transaction.
pub fn gen_external_id(transaction_id: i64) -> String {
    format!(
        "{}{}_{}",
        EXTERNAL_ID_PREFIX,
        Utc::now().timestamp_millis(),
        transaction_id
    )
}

/// Cheap format check to reject garbage before hitting the database.
/// Validates `trx_{millis}_{id}` where both parts are decimal digits.
pub fn is_valid_external_id(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(EXTERNAL_ID_PREFIX) else {
        return false;
    };

    let mut parts = rest.splitn(2, '_');
    let (Some(millis), Some(id)) = (parts.next(), parts.next()) else {
        return false;
    };

    !millis.is_empty()
        && !id.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && id.chars().all(|c| c.is_ascii_digit())
}
