//! Ringing up, paying for and voiding sales through the command layer.

mod common;

use tillstone_cli::commands::cart::{self, AddToCartRequest, UpdateCartItemRequest};
use tillstone_cli::commands::sale;
use tillstone_cli::error::ErrorCode;
use tillstone_core::SaleStatus;

use common::{as_user, on_hand, stocked, till};

#[tokio::test]
async fn test_cash_sale_with_change() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;

    let response = cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "COKE-330".to_string(),
            quantity: Some(3),
        },
    )
    .await
    .unwrap();
    assert_eq!(response.totals.total_cents, 750);
    assert_eq!(response.total_display, "$7.50");

    let draft = sale::checkout(&state).await.unwrap();
    assert_eq!(draft.sale.status, SaleStatus::Draft);
    assert_eq!(draft.remaining_cents, 750);
    assert!(cart::get_cart(&state).await.unwrap().lines.is_empty());

    // Stock only leaves the shelf at finalize
    assert_eq!(on_hand(&state, "COKE-330").await, 10);

    let paid = sale::tender(&state, &draft.sale.id, "cash", Some(1000)).await.unwrap();
    assert_eq!(paid.payment.amount_cents, 750);
    assert_eq!(paid.change_cents, 250);
    assert_eq!(paid.remaining_cents, 0);

    let receipt = sale::finalize_sale(&state, &draft.sale.receipt_number).await.unwrap();
    assert_eq!(receipt.status, "completed");
    assert_eq!(receipt.change_cents, 250);
    assert!(receipt.lines.iter().any(|l| l == "TOTAL  $7.50"));
    assert!(receipt.lines.iter().any(|l| l == "Change  $2.50"));
    assert_eq!(on_hand(&state, "COKE-330").await, 7);
}

#[tokio::test]
async fn test_split_payment_and_overpayment() {
    let state = till().await;
    stocked(&state, "CHIPS", 400, 5).await;
    cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "CHIPS".to_string(),
            quantity: Some(2),
        },
    )
    .await
    .unwrap();
    let draft = sale::checkout(&state).await.unwrap();

    let first = sale::tender(&state, &draft.sale.id, "card", Some(500)).await.unwrap();
    assert_eq!(first.remaining_cents, 300);

    // Card cannot take more than is due
    let err = sale::add_payment(
        &state,
        sale::AddPaymentRequest {
            sale_id: draft.sale.id.clone(),
            method: "card".to_string(),
            amount_cents: Some(301),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentError);

    sale::tender(&state, &draft.sale.id, "cash", None).await.unwrap();
    let receipt = sale::finalize_sale(&state, &draft.sale.id).await.unwrap();
    assert_eq!(receipt.payments.len(), 2);
}

#[tokio::test]
async fn test_finalize_needs_full_payment() {
    let state = till().await;
    stocked(&state, "CHIPS", 400, 5).await;
    cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "CHIPS".to_string(),
            quantity: None,
        },
    )
    .await
    .unwrap();
    let draft = sale::checkout(&state).await.unwrap();

    assert!(sale::finalize_sale(&state, &draft.sale.id).await.is_err());
    assert_eq!(on_hand(&state, "CHIPS").await, 5);
}

#[tokio::test]
async fn test_cart_edits_and_empty_checkout() {
    let state = till().await;
    stocked(&state, "CHIPS", 400, 5).await;

    let err = sale::checkout(&state).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CartError);

    cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "CHIPS".to_string(),
            quantity: Some(2),
        },
    )
    .await
    .unwrap();
    let updated = cart::update_cart_item(
        &state,
        UpdateCartItemRequest {
            product: "CHIPS".to_string(),
            quantity: 4,
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.totals.total_cents, 1600);

    let discounted = cart::set_cart_discount(&state, 1000).await.unwrap();
    assert_eq!(discounted.totals.total_cents, 1440);

    let cleared = cart::clear_cart(&state).await.unwrap();
    assert!(cleared.lines.is_empty());
    assert_eq!(cleared.discount_bps, 0);
}

#[tokio::test]
async fn test_void_of_completed_sale_needs_supervisor() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;
    cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "COKE-330".to_string(),
            quantity: Some(2),
        },
    )
    .await
    .unwrap();
    let draft = sale::checkout(&state).await.unwrap();
    sale::tender(&state, &draft.sale.id, "card", None).await.unwrap();
    sale::finalize_sale(&state, &draft.sale.id).await.unwrap();
    assert_eq!(on_hand(&state, "COKE-330").await, 8);

    let cashier = as_user(&state, "casey", "cashier").await;
    let err = sale::void_sale(&cashier, &draft.sale.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let manager = as_user(&state, "morgan", "manager").await;
    let voided = sale::void_sale(&manager, &draft.sale.id).await.unwrap();
    assert_eq!(voided.sale.status, SaleStatus::Voided);
    assert_eq!(on_hand(&state, "COKE-330").await, 10);
}
