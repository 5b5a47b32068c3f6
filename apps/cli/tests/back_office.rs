//! Master data, users, labels and reports.

mod common;

use tillstone_cli::commands::catalog::{self, CreateLocationRequest};
use tillstone_cli::commands::label::{self, SetLabelRequest};
use tillstone_cli::commands::party::{self, SearchPartiesRequest};
use tillstone_cli::commands::product::{self, SearchProductsRequest, UpdateProductRequest};
use tillstone_cli::commands::report::{self, DailyReportRequest};
use tillstone_cli::commands::user::{self, LoginRequest};
use tillstone_cli::commands::config as config_cmd;
use tillstone_cli::error::ErrorCode;
use tillstone_db::NewCustomer;

use common::{as_user, stocked, supplier, till};

#[tokio::test]
async fn test_product_lookup_update_and_delete() {
    let state = till().await;
    let created = stocked(&state, "COKE-330", 250, 4).await;
    assert_eq!(created.on_hand, Some(4));

    let found = product::search_products(
        &state,
        SearchProductsRequest {
            query: "Product".to_string(),
            limit: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(found.len(), 1);

    let updated = product::update_product(
        &state,
        UpdateProductRequest {
            key: "COKE-330".to_string(),
            price_cents: Some(275),
            reorder_level: Some(10),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.price_cents, 275);

    let low = report::low_stock(&state, None).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].sku, "COKE-330");

    let deleted = product::delete_product(&state, &created.id).await.unwrap();
    assert!(!deleted.is_active);
    assert_eq!(
        product::get_product(&state, "COKE-330").await.unwrap_err().code,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn test_parties_and_locations() {
    let state = till().await;
    supplier(&state, "DAIRY").await;
    party::create_customer(
        &state,
        NewCustomer {
            code: "C-001".to_string(),
            name: "Alex Doe".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let suppliers = party::search_suppliers(
        &state,
        SearchPartiesRequest {
            query: "DAIRY".to_string(),
            limit: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(suppliers.len(), 1);
    assert_eq!(party::get_customer(&state, "C-001").await.unwrap().name, "Alex Doe");

    // The terminal's own location stays
    let err = catalog::delete_location(&state, "MAIN").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    catalog::create_location(
        &state,
        CreateLocationRequest {
            code: "BACK".to_string(),
            name: "Back room".to_string(),
        },
    )
    .await
    .unwrap();
    catalog::delete_location(&state, "BACK").await.unwrap();
    assert_eq!(catalog::list_locations(&state, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_users_and_login() {
    let state = till().await;
    let manager = as_user(&state, "morgan", "manager").await;

    let user = user::login(
        &state,
        LoginRequest {
            username: "morgan".to_string(),
            password: "correct horse battery".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(user.id, manager.user_id);

    let err = user::login(
        &state,
        LoginRequest {
            username: "morgan".to_string(),
            password: "wrong password".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    // Cashiers cannot manage users
    let cashier = as_user(&state, "casey", "cashier").await;
    let err = user::set_user_role(&cashier, "casey", "admin").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    assert_eq!(user::operator_id(&state, "casey").await.unwrap(), cashier.user_id);
    assert!(user::operator_id(&state, "nobody").await.is_err());
}

#[tokio::test]
async fn test_labels_fall_back_to_default_language() {
    let state = till().await;
    let seeded = label::seed_labels(&state).await.unwrap();
    assert!(seeded.inserted > 0);
    assert_eq!(label::seed_labels(&state).await.unwrap().inserted, 0);

    label::set_label(
        &state,
        SetLabelRequest {
            language: "en".to_string(),
            key: "promo.banner".to_string(),
            text: "Two for one".to_string(),
        },
    )
    .await
    .unwrap();

    let spanish = label::label_set(&state, Some("es")).await.unwrap();
    assert_eq!(spanish.labels["menu.sales"], "Ventas");
    assert_eq!(spanish.labels["promo.banner"], "Two for one");

    let default = label::label_set(&state, None).await.unwrap();
    assert_eq!(default.language, "en");
    assert_eq!(default.labels["menu.sales"], "Sales");
}

#[tokio::test]
async fn test_daily_report_and_config() {
    let state = till().await;

    let daily = report::daily_report(&state, DailyReportRequest { date: None }).await.unwrap();
    assert_eq!(daily.summary.sale_count, 0);
    assert_eq!(daily.net_display, "$0.00");

    let err = report::daily_report(
        &state,
        DailyReportRequest {
            date: Some("yesterday".to_string()),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    stocked(&state, "SOAP", 150, 10).await;
    let valuation = report::stock_valuation(&state, None).await.unwrap();
    assert_eq!(valuation.rows.len(), 1);

    let config = config_cmd::get_config(&state).await.unwrap();
    assert_eq!(config.default_location, "MAIN");

    let status = config_cmd::get_status(&state).await.unwrap();
    assert_eq!(status.location_id, state.location_id);
    assert_eq!(status.database.path, ":memory:");
    assert!(status.database.schema.is_current());
}
