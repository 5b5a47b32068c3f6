//! Refunds and exchanges against completed sales.

mod common;

use tillstone_cli::commands::cart::{self, AddToCartRequest};
use tillstone_cli::commands::refund::{self, ExchangeSaleRequest, RefundSaleRequest, ReturnLineRequest};
use tillstone_cli::commands::sale::{self, ListSalesRequest};
use tillstone_cli::error::ErrorCode;
use tillstone_cli::state::AppState;
use tillstone_core::{PaymentMethod, Sale};

use common::{on_hand, stocked, till};

async fn completed_sale(state: &AppState, sku: &str, quantity: i64) -> Sale {
    cart::add_to_cart(
        state,
        AddToCartRequest {
            product: sku.to_string(),
            quantity: Some(quantity),
        },
    )
    .await
    .unwrap();
    let draft = sale::checkout(state).await.unwrap();
    sale::tender(state, &draft.sale.id, "cash", None).await.unwrap();
    sale::finalize_sale(state, &draft.sale.id).await.unwrap();
    sale::get_sale(state, &draft.sale.id).await.unwrap().sale
}

fn line(item: &str, quantity: i64, restock: bool) -> ReturnLineRequest {
    ReturnLineRequest {
        item: item.to_string(),
        quantity,
        restock,
    }
}

#[tokio::test]
async fn test_refund_by_sku_restocks() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;
    let sold = completed_sale(&state, "COKE-330", 3).await;
    assert_eq!(on_hand(&state, "COKE-330").await, 7);

    let refunded = refund::refund_sale(
        &state,
        RefundSaleRequest {
            sale: sold.receipt_number.clone(),
            lines: vec![line("COKE-330", 1, true)],
            reason: Some("dented".to_string()),
            method: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(refunded.refund.total_cents, 250);
    assert_eq!(refunded.refund.method, PaymentMethod::Cash);
    assert_eq!(refunded.items.len(), 1);
    assert_eq!(on_hand(&state, "COKE-330").await, 8);

    let history = refund::refunds_for_sale(&state, &sold.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_refund_without_restock_leaves_stock() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;
    let sold = completed_sale(&state, "COKE-330", 2).await;

    refund::refund_sale(
        &state,
        RefundSaleRequest {
            sale: sold.id.clone(),
            lines: vec![line("COKE-330", 2, false)],
            method: Some("card".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(on_hand(&state, "COKE-330").await, 8);
}

#[tokio::test]
async fn test_cannot_refund_more_than_sold() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;
    let sold = completed_sale(&state, "COKE-330", 2).await;

    refund::refund_sale(
        &state,
        RefundSaleRequest {
            sale: sold.id.clone(),
            lines: vec![line("COKE-330", 1, true)],
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = refund::refund_sale(
        &state,
        RefundSaleRequest {
            sale: sold.id.clone(),
            lines: vec![line("COKE-330", 2, true)],
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::BusinessLogic);

    // A refunded sale can no longer be voided
    assert!(sale::void_sale(&state, &sold.id).await.is_err());
}

#[tokio::test]
async fn test_exchange_sells_the_cart() {
    let state = till().await;
    stocked(&state, "COKE-330", 250, 10).await;
    stocked(&state, "CHIPS", 400, 10).await;
    let sold = completed_sale(&state, "COKE-330", 2).await;

    // Nothing rung up yet
    let err = refund::exchange_sale(
        &state,
        ExchangeSaleRequest {
            sale: sold.id.clone(),
            lines: vec![line("COKE-330", 1, true)],
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::CartError);

    cart::add_to_cart(
        &state,
        AddToCartRequest {
            product: "CHIPS".to_string(),
            quantity: Some(1),
        },
    )
    .await
    .unwrap();

    let exchanged = refund::exchange_sale(
        &state,
        ExchangeSaleRequest {
            sale: sold.id.clone(),
            lines: vec![line("COKE-330", 1, true)],
            balance_method: Some("cash".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(exchanged.exchange.balance_cents, 150);
    assert_eq!(exchanged.refund.refund.method, PaymentMethod::StoreCredit);
    assert_eq!(exchanged.new_sale.remaining_cents, 0);
    assert_eq!(exchanged.new_sale.payments.len(), 2);
    assert!(cart::get_cart(&state).await.unwrap().lines.is_empty());

    assert_eq!(on_hand(&state, "COKE-330").await, 9);
    assert_eq!(on_hand(&state, "CHIPS").await, 9);

    let fetched = refund::get_exchange(&state, &exchanged.exchange.id).await.unwrap();
    assert_eq!(fetched.new_sale.sale.id, exchanged.new_sale.sale.id);
    assert_eq!(fetched.refund.refund.id, exchanged.refund.refund.id);

    let today = sale::list_sales(&state, ListSalesRequest::default()).await.unwrap();
    let ids: Vec<_> = today.iter().map(|s| s.id.as_str()).collect();
    assert!(ids.contains(&sold.id.as_str()));
    assert!(ids.contains(&exchanged.new_sale.sale.id.as_str()));
}
