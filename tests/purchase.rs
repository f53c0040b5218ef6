//! Purchase creation tests (engine + POST /transactions)

mod common;

use std::sync::atomic::Ordering;

use axum::{body::Body, http::Request};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;

fn purchase_request(product_id: i64) -> CreateTransaction {
    CreateTransaction {
        product_id,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        phone: "081234567890".to_string(),
    }
}

#[tokio::test]
async fn test_create_purchase_scenario() {
    let ctx = test_context();
    let product_id = {
        let conn = ctx.state.db.get().unwrap();
        create_test_product(&conn, "Book A", 1000).id
    };

    let receipt = bookship::payments::create_purchase(&ctx.state, purchase_request(product_id))
        .await
        .expect("purchase should succeed");

    assert!(!receipt.invoice_url.is_empty());
    assert_eq!(ctx.gateway.create_calls.load(Ordering::SeqCst), 1);

    let conn = ctx.state.db.get().unwrap();
    let (rows, total) = queries::list_transactions_paginated(&conn, None, 10, 0).unwrap();
    assert_eq!(total, 1);

    let trx = queries::get_transaction_by_id(&conn, rows[0].id).unwrap().unwrap();
    assert_eq!(trx.status, TransactionStatus::Pending);
    let external_id = trx.external_id.expect("external id assigned");
    assert!(external_id.starts_with("trx_"));
    assert!(bookship::id::is_valid_external_id(&external_id));
    assert_eq!(trx.invoice_url.as_deref(), Some(receipt.invoice_url.as_str()));
}

#[tokio::test]
async fn test_external_ids_are_unique_across_purchases() {
    let ctx = test_context();
    let product_id = {
        let conn = ctx.state.db.get().unwrap();
        create_test_product(&conn, "Book A", 1000).id
    };

    // Same buyer, back to back - the ids must still differ.
    bookship::payments::create_purchase(&ctx.state, purchase_request(product_id))
        .await
        .unwrap();
    bookship::payments::create_purchase(&ctx.state, purchase_request(product_id))
        .await
        .unwrap();

    let conn = ctx.state.db.get().unwrap();
    let (rows, _) = queries::list_transactions_paginated(&conn, None, 10, 0).unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.external_id.clone().unwrap()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_purchase_product_not_found() {
    let ctx = test_context();

    let err = bookship::payments::create_purchase(&ctx.state, purchase_request(42))
        .await
        .expect_err("missing product must fail");

    assert!(matches!(err, AppError::NotFound(_)));
    // Nothing was sent to the gateway.
    assert_eq!(ctx.gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_purchase_gateway_failure_leaves_pending_orphan() {
    let ctx = test_context();
    let product_id = {
        let conn = ctx.state.db.get().unwrap();
        create_test_product(&conn, "Book A", 1000).id
    };
    ctx.gateway.fail_create.store(true, Ordering::SeqCst);

    let err = bookship::payments::create_purchase(&ctx.state, purchase_request(product_id))
        .await
        .expect_err("gateway failure must surface");
    assert!(matches!(err, AppError::PaymentGateway(_)));

    // The row stays behind, PENDING, with no gateway correlation.
    let conn = ctx.state.db.get().unwrap();
    let (rows, total) = queries::list_transactions_paginated(&conn, None, 10, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].status, TransactionStatus::Pending);
    assert!(rows[0].external_id.is_none());
}

#[tokio::test]
async fn test_post_transactions_endpoint() {
    let ctx = test_context();
    let product_id = {
        let conn = ctx.state.db.get().unwrap();
        create_test_product(&conn, "Book A", 1000).id
    };
    let app = test_app(ctx.state.clone());

    let body = json!({
        "productId": product_id,
        "name": "Alice",
        "email": "alice@example.com",
        "phone": "081234567890"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transactions")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let invoice_url = json["invoiceUrl"].as_str().unwrap_or("");
    assert!(invoice_url.starts_with("https://checkout.test/"));
}

#[tokio::test]
async fn test_post_transactions_validation_errors() {
    let ctx = test_context();
    let product_id = {
        let conn = ctx.state.db.get().unwrap();
        create_test_product(&conn, "Book A", 1000).id
    };

    let cases = [
        json!({ "name": "Alice", "email": "a@b.com", "phone": "08123" }),
        json!({ "productId": product_id, "name": "", "email": "a@b.com", "phone": "08123" }),
        json!({ "productId": product_id, "name": "Alice", "email": "not-an-email", "phone": "08123" }),
        json!({ "productId": product_id, "name": "Alice", "email": "a@b.com", "phone": "" }),
    ];

    for case in cases {
        let app = test_app(ctx.state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transactions")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&case).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            axum::http::StatusCode::BAD_REQUEST,
            "case: {}",
            case
        );
    }

    // No request reached the gateway and no row was persisted.
    assert_eq!(ctx.gateway.create_calls.load(Ordering::SeqCst), 0);
    let conn = ctx.state.db.get().unwrap();
    let (_, total) = queries::list_transactions_paginated(&conn, None, 10, 0).unwrap();
    assert_eq!(total, 0);
}
