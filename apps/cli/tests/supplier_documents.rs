//! Goods received, returned and replaced, and the stock they move.

mod common;

use tillstone_cli::commands::goods::{
    self, CreateGoodsReplaceRequest, CreateGoodsReturnRequest, CreateGrnRequest, GrnLineRequest,
    ReplaceLineRequest, ReturnToSupplierLine,
};
use tillstone_cli::commands::stock::{self, AdjustStockRequest, AdjustmentLineRequest};
use tillstone_cli::error::ErrorCode;
use tillstone_core::DocumentStatus;

use common::{as_user, on_hand, stocked, supplier, till};

fn grn_line(product: &str, batch: &str, quantity: i64) -> GrnLineRequest {
    GrnLineRequest {
        product: product.to_string(),
        batch_number: batch.to_string(),
        expiry_date: Some("2030-06-30".to_string()),
        quantity,
        free_quantity: 0,
        unit_cost_cents: 120,
        discount_cents: 0,
    }
}

#[tokio::test]
async fn test_grn_post_and_cancel() {
    let state = till().await;
    stocked(&state, "MILK-1L", 199, 0).await;
    supplier(&state, "DAIRY").await;

    let grn = goods::create_grn(
        &state,
        CreateGrnRequest {
            supplier: "DAIRY".to_string(),
            supplier_invoice: Some("INV-88".to_string()),
            lines: vec![grn_line("MILK-1L", "B-1", 24)],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(grn.grn.status, DocumentStatus::Pending);
    assert_eq!(grn.grn.total_cents, 24 * 120);
    assert_eq!(on_hand(&state, "MILK-1L").await, 0);

    let posted = goods::post_grn(&state, &grn.grn.grn_number).await.unwrap();
    assert_eq!(posted.grn.status, DocumentStatus::Posted);
    assert_eq!(on_hand(&state, "MILK-1L").await, 24);

    let batches = stock::product_batches(&state, "MILK-1L", None, false).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_number, "B-1");

    // Posted documents are locked
    assert!(goods::add_grn_item(&state, &grn.grn.id, grn_line("MILK-1L", "B-2", 1))
        .await
        .is_err());

    let cancelled = goods::cancel_grn(&state, &grn.grn.id).await.unwrap();
    assert_eq!(cancelled.grn.status, DocumentStatus::Cancelled);
    assert_eq!(on_hand(&state, "MILK-1L").await, 0);

    let movements = stock::document_movements(&state, "grn", &grn.grn.id).await.unwrap();
    assert_eq!(movements.iter().map(|m| m.delta).sum::<i64>(), 0);
}

#[tokio::test]
async fn test_expiring_batches_flag_expired_stock() {
    let state = till().await;
    stocked(&state, "YOGURT", 89, 0).await;
    supplier(&state, "DAIRY").await;

    let yesterday = (chrono::Utc::now().date_naive() - chrono::Duration::days(1)).to_string();
    let grn = goods::create_grn(
        &state,
        CreateGrnRequest {
            supplier: "DAIRY".to_string(),
            lines: vec![
                GrnLineRequest {
                    expiry_date: Some(yesterday),
                    ..grn_line("YOGURT", "OLD", 5)
                },
                grn_line("YOGURT", "NEW", 10),
            ],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    goods::post_grn(&state, &grn.grn.id).await.unwrap();

    let expiring = stock::expiring_batches(&state, 30).await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].batch.batch_number, "OLD");
    assert!(expiring[0].expired);
    assert_eq!(expiring[0].value_cents, 5 * 120);

    assert!(stock::expiring_batches(&state, -1).await.is_err());
}

#[tokio::test]
async fn test_return_and_replace() {
    let state = till().await;
    stocked(&state, "MILK-1L", 199, 0).await;
    supplier(&state, "DAIRY").await;

    let grn = goods::create_grn(
        &state,
        CreateGrnRequest {
            supplier: "DAIRY".to_string(),
            lines: vec![grn_line("MILK-1L", "B-1", 10)],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    goods::post_grn(&state, &grn.grn.id).await.unwrap();

    let goods_return = goods::create_goods_return(
        &state,
        CreateGoodsReturnRequest {
            supplier: "DAIRY".to_string(),
            grn: Some(grn.grn.grn_number.clone()),
            reason: Some("sour".to_string()),
            lines: vec![ReturnToSupplierLine {
                product: "MILK-1L".to_string(),
                batch: Some("B-1".to_string()),
                quantity: 4,
                unit_cost_cents: None,
            }],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    goods::post_goods_return(&state, &goods_return.goods_return.id).await.unwrap();
    assert_eq!(on_hand(&state, "MILK-1L").await, 6);

    let replace_line = |quantity| ReplaceLineRequest {
        product: "MILK-1L".to_string(),
        batch_number: "B-9".to_string(),
        expiry_date: None,
        quantity,
        unit_cost_cents: 120,
    };

    let too_many = goods::create_goods_replace(
        &state,
        CreateGoodsReplaceRequest {
            goods_return_id: goods_return.goods_return.id.clone(),
            notes: None,
            lines: vec![replace_line(5)],
        },
    )
    .await
    .unwrap_err();
    assert_eq!(too_many.code, ErrorCode::BusinessLogic);

    let replace = goods::create_goods_replace(
        &state,
        CreateGoodsReplaceRequest {
            goods_return_id: goods_return.goods_return.id.clone(),
            notes: None,
            lines: vec![replace_line(4)],
        },
    )
    .await
    .unwrap();
    goods::post_goods_replace(&state, &replace.goods_replace.id).await.unwrap();
    assert_eq!(on_hand(&state, "MILK-1L").await, 10);

    let for_return = goods::list_goods_replaces(&state, None, Some(&goods_return.goods_return.id))
        .await
        .unwrap();
    assert_eq!(for_return.len(), 1);
}

#[tokio::test]
async fn test_adjustment_and_transfer() {
    let state = till().await;
    stocked(&state, "SOAP", 150, 20).await;

    let cashier = as_user(&state, "casey", "cashier").await;
    let request = AdjustStockRequest {
        reason: "damage".to_string(),
        lines: vec![AdjustmentLineRequest {
            product: "SOAP".to_string(),
            batch: None,
            delta: -2,
        }],
        ..Default::default()
    };
    let err = stock::adjust_stock(&cashier, request.clone()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let adjusted = stock::adjust_stock(&state, request).await.unwrap();
    assert_eq!(adjusted.items.len(), 1);
    assert_eq!(on_hand(&state, "SOAP").await, 18);

    tillstone_cli::commands::catalog::create_location(
        &state,
        tillstone_cli::commands::catalog::CreateLocationRequest {
            code: "BACK".to_string(),
            name: "Back room".to_string(),
        },
    )
    .await
    .unwrap();

    let transfer = stock::create_transfer(
        &state,
        stock::CreateTransferRequest {
            to: "BACK".to_string(),
            lines: vec![stock::TransferLineRequest {
                product: "SOAP".to_string(),
                batch: None,
                quantity: 5,
            }],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    stock::post_transfer(&state, &transfer.transfer.id).await.unwrap();
    assert_eq!(on_hand(&state, "SOAP").await, 13);

    let levels = stock::stock_levels(&state, None, Some("SOAP")).await.unwrap();
    assert_eq!(levels.iter().map(|l| l.quantity).sum::<i64>(), 18);

    let same = stock::create_transfer(
        &state,
        stock::CreateTransferRequest {
            to: "MAIN".to_string(),
            lines: vec![stock::TransferLineRequest {
                product: "SOAP".to_string(),
                batch: None,
                quantity: 1,
            }],
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(same.code, ErrorCode::BusinessLogic);
}
