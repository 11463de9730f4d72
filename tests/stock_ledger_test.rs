mod common;

use common::{create_test_item, create_test_warehouse, get_balance, setup};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use stockroom_api::{
    entities::stock_movement::{self, Entity as StockMovement},
    errors::ServiceError,
    services::stock::{AdjustmentDirection, StockAdjustment, StockBalanceFilter},
};

fn adjustment(
    warehouse_id: i64,
    item_id: i64,
    quantity: &str,
    direction: AdjustmentDirection,
) -> StockAdjustment {
    StockAdjustment {
        warehouse_id,
        item_id,
        quantity: quantity.to_string(),
        direction,
        reason: "cycle count".to_string(),
    }
}

#[tokio::test]
async fn increase_creates_balance_row_lazily() {
    let app = setup().await;
    let item = create_test_item(&app.db, "BOLT-01", "Hex bolt").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    assert!(get_balance(&app.db, item.id, warehouse.id).await.is_none());

    let updated = app
        .stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "7.5",
            AdjustmentDirection::Increase,
        ))
        .await
        .expect("Failed to adjust stock");

    assert_eq!(updated.quantity, dec!(7.5));
    assert_eq!(updated.reserved, Decimal::ZERO);

    let balance = get_balance(&app.db, item.id, warehouse.id)
        .await
        .expect("Balance row should exist after first increase");
    assert_eq!(balance.quantity, dec!(7.5));
}

#[tokio::test]
async fn decrease_without_stock_fails_and_leaves_nothing_behind() {
    let app = setup().await;
    let item = create_test_item(&app.db, "BOLT-02", "Hex bolt M8").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    let err = app
        .stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "1",
            AdjustmentDirection::Decrease,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert!(get_balance(&app.db, item.id, warehouse.id).await.is_none());
}

#[tokio::test]
async fn decrease_never_drives_a_balance_negative() {
    let app = setup().await;
    let item = create_test_item(&app.db, "NUT-01", "Hex nut").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    app.stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "3",
            AdjustmentDirection::Increase,
        ))
        .await
        .expect("Failed to seed stock");

    let err = app
        .stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "3.0001",
            AdjustmentDirection::Decrease,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Balance unchanged by the failed operation
    let balance = get_balance(&app.db, item.id, warehouse.id).await.unwrap();
    assert_eq!(balance.quantity, dec!(3));

    // Draining to exactly zero is allowed and keeps the row around
    app.stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "3",
            AdjustmentDirection::Decrease,
        ))
        .await
        .expect("Draining to zero should succeed");

    let balance = get_balance(&app.db, item.id, warehouse.id)
        .await
        .expect("Zero-quantity row must persist");
    assert_eq!(balance.quantity, Decimal::ZERO);
}

#[tokio::test]
async fn adjust_rejects_invalid_quantities_before_touching_rows() {
    let app = setup().await;
    let item = create_test_item(&app.db, "NUT-02", "Wing nut").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    for quantity in ["abc", "", "0", "-5", "1,5"] {
        let err = app
            .stock
            .adjust(adjustment(
                warehouse.id,
                item.id,
                quantity,
                AdjustmentDirection::Increase,
            ))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::InvalidQuantity(_)),
            "quantity {:?} should be rejected",
            quantity
        );
    }

    assert!(get_balance(&app.db, item.id, warehouse.id).await.is_none());
}

#[tokio::test]
async fn every_mutation_records_a_movement_with_reason() {
    let app = setup().await;
    let item = create_test_item(&app.db, "ROD-01", "Threaded rod").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    app.stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "10",
            AdjustmentDirection::Increase,
        ))
        .await
        .unwrap();
    app.stock
        .adjust(adjustment(
            warehouse.id,
            item.id,
            "4",
            AdjustmentDirection::Decrease,
        ))
        .await
        .unwrap();

    let movements = StockMovement::find()
        .filter(stock_movement::Column::ItemId.eq(item.id))
        .filter(stock_movement::Column::WarehouseId.eq(warehouse.id))
        .all(app.db.as_ref())
        .await
        .expect("Failed to query movements");

    assert_eq!(movements.len(), 2);
    assert!(movements
        .iter()
        .all(|m| m.reason.as_deref() == Some("cycle count")));

    let decrease = movements
        .iter()
        .find(|m| m.movement_type == "decrease")
        .expect("Decrease movement recorded");
    assert_eq!(decrease.previous_quantity, dec!(10));
    assert_eq!(decrease.new_quantity, dec!(6));
}

#[tokio::test]
async fn get_balances_resolves_names_and_computes_available() {
    let app = setup().await;
    let bolt = create_test_item(&app.db, "BOLT-03", "Anchor bolt").await;
    let nut = create_test_item(&app.db, "NUT-03", "Lock nut").await;
    let main = create_test_warehouse(&app.db, "Main").await;
    let remote = create_test_warehouse(&app.db, "Remote").await;

    for (warehouse_id, item_id, quantity) in [
        (main.id, bolt.id, "5"),
        (main.id, nut.id, "2"),
        (remote.id, bolt.id, "9"),
    ] {
        app.stock
            .adjust(adjustment(
                warehouse_id,
                item_id,
                quantity,
                AdjustmentDirection::Increase,
            ))
            .await
            .unwrap();
    }

    let all = app
        .stock
        .get_balances(StockBalanceFilter::default())
        .await
        .expect("Failed to list balances");
    assert_eq!(all.len(), 3);

    let main_only = app
        .stock
        .get_balances(StockBalanceFilter {
            warehouse_id: Some(main.id),
            item_id: None,
        })
        .await
        .unwrap();
    assert_eq!(main_only.len(), 2);
    assert!(main_only.iter().all(|b| b.warehouse_name == "Main"));

    let bolt_at_remote = app
        .stock
        .get_balances(StockBalanceFilter {
            warehouse_id: Some(remote.id),
            item_id: Some(bolt.id),
        })
        .await
        .unwrap();
    assert_eq!(bolt_at_remote.len(), 1);
    assert_eq!(bolt_at_remote[0].item_name, "Anchor bolt");
    assert_eq!(bolt_at_remote[0].quantity, dec!(9));
    assert_eq!(bolt_at_remote[0].reserved, Decimal::ZERO);
    assert_eq!(bolt_at_remote[0].available, dec!(9));
}
