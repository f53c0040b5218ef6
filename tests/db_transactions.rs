//! Transaction store adapter tests

mod common;

use common::*;

#[test]
fn test_create_starts_pending_without_external_id() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);

    let trx = create_test_transaction(&conn, product.id, "buyer@example.com");

    assert_eq!(trx.status, TransactionStatus::Pending);
    assert!(trx.external_id.is_none());
    assert!(trx.invoice_id.is_none());
    assert!(trx.invoice_url.is_none());

    let fetched = queries::get_transaction_by_id(&conn, trx.id)
        .unwrap()
        .expect("row must exist");
    assert_eq!(fetched.email, "buyer@example.com");
    assert_eq!(fetched.status, TransactionStatus::Pending);
}

#[test]
fn test_get_missing_returns_none() {
    let pool = test_pool();
    let conn = pool.get().unwrap();

    assert!(queries::get_transaction_by_id(&conn, 999).unwrap().is_none());
    assert!(queries::get_transaction_by_external_id(&conn, "trx_1_999")
        .unwrap()
        .is_none());
}

#[test]
fn test_partial_update_and_lookup_by_external_id() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    let trx = create_test_transaction(&conn, product.id, "buyer@example.com");

    let updated = queries::update_transaction(
        &conn,
        trx.id,
        &UpdateTransaction {
            external_id: Some("trx_1700000000000_1".to_string()),
            invoice_id: Some("inv_abc".to_string()),
            invoice_url: Some("https://checkout.test/inv_abc".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(updated);

    let fetched = queries::get_transaction_by_external_id(&conn, "trx_1700000000000_1")
        .unwrap()
        .expect("lookup by external id");
    assert_eq!(fetched.id, trx.id);
    assert_eq!(fetched.invoice_id.as_deref(), Some("inv_abc"));
    // Untouched fields survive a partial update.
    assert_eq!(fetched.email, "buyer@example.com");
    assert_eq!(fetched.status, TransactionStatus::Pending);
}

#[test]
fn test_update_missing_id_reports_not_found() {
    let pool = test_pool();
    let conn = pool.get().unwrap();

    let updated = queries::update_transaction(
        &conn,
        12345,
        &UpdateTransaction {
            name: Some("Nobody".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!updated);
}

#[test]
fn test_external_id_unique_constraint() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    let a = create_test_transaction(&conn, product.id, "a@example.com");
    let b = create_test_transaction(&conn, product.id, "b@example.com");

    let ext = UpdateTransaction {
        external_id: Some("trx_1_1".to_string()),
        ..Default::default()
    };
    queries::update_transaction(&conn, a.id, &ext).unwrap();

    let result = queries::update_transaction(&conn, b.id, &ext);
    assert!(result.is_err(), "duplicate external id must be rejected");
}

#[test]
fn test_settle_cas_single_winner() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    let trx = create_test_transaction(&conn, product.id, "a@example.com");
    queries::update_transaction(
        &conn,
        trx.id,
        &UpdateTransaction {
            external_id: Some("trx_1_10".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(queries::try_settle_transaction(&conn, "trx_1_10").unwrap());
    // Second delivery loses the race.
    assert!(!queries::try_settle_transaction(&conn, "trx_1_10").unwrap());

    let fetched = queries::get_transaction_by_external_id(&conn, "trx_1_10")
        .unwrap()
        .unwrap();
    assert_eq!(fetched.status, TransactionStatus::Settled);
}

#[test]
fn test_terminal_states_never_regress() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);

    let settled = create_test_transaction(&conn, product.id, "a@example.com");
    queries::update_transaction(
        &conn,
        settled.id,
        &UpdateTransaction {
            external_id: Some("trx_1_20".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    queries::try_settle_transaction(&conn, "trx_1_20").unwrap();

    // An expired invoice cannot fail an already settled transaction.
    assert!(!queries::try_fail_transaction(&conn, "trx_1_20").unwrap());
    let fetched = queries::get_transaction_by_external_id(&conn, "trx_1_20")
        .unwrap()
        .unwrap();
    assert_eq!(fetched.status, TransactionStatus::Settled);

    let failed = create_test_transaction(&conn, product.id, "b@example.com");
    queries::update_transaction(
        &conn,
        failed.id,
        &UpdateTransaction {
            external_id: Some("trx_1_21".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    queries::try_fail_transaction(&conn, "trx_1_21").unwrap();

    // A late settle cannot flip FAILED either.
    assert!(!queries::try_settle_transaction(&conn, "trx_1_21").unwrap());
    let fetched = queries::get_transaction_by_external_id(&conn, "trx_1_21")
        .unwrap()
        .unwrap();
    assert_eq!(fetched.status, TransactionStatus::Failed);
}

#[test]
fn test_delete_transaction() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    let trx = create_test_transaction(&conn, product.id, "a@example.com");

    assert!(queries::delete_transaction(&conn, trx.id).unwrap());
    assert!(queries::get_transaction_by_id(&conn, trx.id).unwrap().is_none());
    // Deleting again reports not found.
    assert!(!queries::delete_transaction(&conn, trx.id).unwrap());
}

#[test]
fn test_list_paginated_with_product_join() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);

    for i in 0..5 {
        create_test_transaction(&conn, product.id, &format!("buyer{}@example.com", i));
    }

    let (rows, total) = queries::list_transactions_paginated(&conn, None, 2, 0).unwrap();
    assert_eq!(total, 5);
    assert_eq!(rows.len(), 2);
    // Newest first: same created_at second, so the id tiebreaker decides.
    assert!(rows[0].id > rows[1].id);
    let product_summary = rows[0].product.as_ref().expect("join must find product");
    assert_eq!(product_summary.title, "Book A");

    let (rows, total) = queries::list_transactions_paginated(&conn, None, 2, 4).unwrap();
    assert_eq!(total, 5);
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_list_date_range_filter() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    create_test_transaction(&conn, product.id, "now@example.com");

    let t = now();
    // Range fully in the past excludes the row created just now.
    let (rows, total) =
        queries::list_transactions_paginated(&conn, Some((t - 7200, t - 3600)), 10, 0).unwrap();
    assert_eq!(total, 0);
    assert!(rows.is_empty());

    // Range around now includes it.
    let (rows, total) =
        queries::list_transactions_paginated(&conn, Some((t - 60, t + 60)), 10, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_export_listing_matches_filter() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    let product = create_test_product(&conn, "Book A", 1000);
    create_test_transaction(&conn, product.id, "a@example.com");
    create_test_transaction(&conn, product.id, "b@example.com");

    let rows = queries::list_transactions_for_export(&conn, None).unwrap();
    assert_eq!(rows.len(), 2);

    let t = now();
    let rows =
        queries::list_transactions_for_export(&conn, Some((t - 7200, t - 3600))).unwrap();
    assert!(rows.is_empty());
}
