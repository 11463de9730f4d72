mod common;

use common::{create_test_item, create_test_supplier, create_test_warehouse, get_balance, setup, test_actor};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockroom_api::{
    entities::{
        document::{DocumentStatus, DocumentType},
        document_item::LineDirection,
    },
    errors::ServiceError,
    services::documents::{CreateDocumentRequest, DocumentLineInput},
};

fn lines(items: &[(i64, &str)]) -> Vec<DocumentLineInput> {
    items
        .iter()
        .map(|(item_id, quantity)| DocumentLineInput {
            item_id: *item_id,
            quantity: quantity.to_string(),
            direction: None,
            price: None,
        })
        .collect()
}

fn incoming(supplier_id: i64, warehouse_to_id: i64, items: &[(i64, &str)]) -> CreateDocumentRequest {
    CreateDocumentRequest {
        document_type: DocumentType::Incoming,
        date: None,
        warehouse_from_id: None,
        warehouse_to_id: Some(warehouse_to_id),
        supplier_id: Some(supplier_id),
        comment: None,
        items: lines(items),
    }
}

fn transfer(
    warehouse_from_id: i64,
    warehouse_to_id: i64,
    items: &[(i64, &str)],
) -> CreateDocumentRequest {
    CreateDocumentRequest {
        document_type: DocumentType::Transfer,
        date: None,
        warehouse_from_id: Some(warehouse_from_id),
        warehouse_to_id: Some(warehouse_to_id),
        supplier_id: None,
        comment: None,
        items: lines(items),
    }
}

fn production(
    warehouse_from_id: i64,
    warehouse_to_id: i64,
    items: &[(i64, &str, LineDirection)],
) -> CreateDocumentRequest {
    CreateDocumentRequest {
        document_type: DocumentType::Production,
        date: None,
        warehouse_from_id: Some(warehouse_from_id),
        warehouse_to_id: Some(warehouse_to_id),
        supplier_id: None,
        comment: None,
        items: items
            .iter()
            .map(|(item_id, quantity, direction)| DocumentLineInput {
                item_id: *item_id,
                quantity: quantity.to_string(),
                direction: Some(*direction),
                price: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn incoming_receipt_increases_only_the_destination_balance() {
    let app = setup().await;
    let item = create_test_item(&app.db, "PIPE-01", "Steel pipe").await;
    let supplier = create_test_supplier(&app.db, "Acme Metals").await;
    let destination = create_test_warehouse(&app.db, "Main").await;
    let other = create_test_warehouse(&app.db, "Remote").await;

    let detail = app
        .documents
        .create(
            incoming(supplier.id, destination.id, &[(item.id, "5")]),
            test_actor(),
        )
        .await
        .expect("Failed to create incoming document");

    assert_eq!(detail.document_type, DocumentType::Incoming);
    assert_eq!(detail.status, DocumentStatus::Completed);
    assert_eq!(detail.supplier.as_ref().unwrap().name, "Acme Metals");
    assert_eq!(detail.warehouse_to.as_ref().unwrap().name, "Main");
    assert!(detail.warehouse_from.is_none());
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, dec!(5));
    assert_eq!(detail.items[0].item_code, "PIPE-01");
    assert_eq!(detail.items[0].item_unit, "pcs");

    let balance = get_balance(&app.db, item.id, destination.id)
        .await
        .expect("Balance created at destination");
    assert_eq!(balance.quantity, dec!(5));
    assert_eq!(balance.reserved, Decimal::ZERO);

    // No other warehouse is touched
    assert!(get_balance(&app.db, item.id, other.id).await.is_none());
}

#[tokio::test]
async fn transfer_moves_stock_and_fails_atomically_when_insufficient() {
    let app = setup().await;
    let item = create_test_item(&app.db, "PIPE-02", "Copper pipe").await;
    let supplier = create_test_supplier(&app.db, "Acme Metals").await;
    let source = create_test_warehouse(&app.db, "Source").await;
    let destination = create_test_warehouse(&app.db, "Destination").await;

    app.documents
        .create(incoming(supplier.id, source.id, &[(item.id, "5")]), test_actor())
        .await
        .expect("Failed to seed stock via incoming document");

    app.documents
        .create(transfer(source.id, destination.id, &[(item.id, "3")]), test_actor())
        .await
        .expect("Failed to create transfer");

    let at_source = get_balance(&app.db, item.id, source.id).await.unwrap();
    let at_destination = get_balance(&app.db, item.id, destination.id).await.unwrap();
    assert_eq!(at_source.quantity, dec!(2));
    assert_eq!(at_destination.quantity, dec!(3));

    // Transferring more than remains must not change either balance
    let err = app
        .documents
        .create(
            transfer(source.id, destination.id, &[(item.id, "10")]),
            test_actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let at_source = get_balance(&app.db, item.id, source.id).await.unwrap();
    let at_destination = get_balance(&app.db, item.id, destination.id).await.unwrap();
    assert_eq!(at_source.quantity, dec!(2));
    assert_eq!(at_destination.quantity, dec!(3));
}

#[tokio::test]
async fn transfer_into_empty_warehouse_rolls_back_completely() {
    let app = setup().await;
    let item = create_test_item(&app.db, "PIPE-03", "PVC pipe").await;
    let source = create_test_warehouse(&app.db, "Source").await;
    let destination = create_test_warehouse(&app.db, "Destination").await;

    let err = app
        .documents
        .create(transfer(source.id, destination.id, &[(item.id, "1")]), test_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Neither side gained a row, and no document survived the rollback
    assert!(get_balance(&app.db, item.id, source.id).await.is_none());
    assert!(get_balance(&app.db, item.id, destination.id).await.is_none());
    assert!(app
        .documents
        .list(Default::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cancel_is_the_exact_inverse_of_create() {
    let app = setup().await;
    let item = create_test_item(&app.db, "WIRE-01", "Copper wire").await;
    let supplier = create_test_supplier(&app.db, "Volt Supply").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    let created = app
        .documents
        .create(incoming(supplier.id, warehouse.id, &[(item.id, "8")]), test_actor())
        .await
        .unwrap();

    let cancelled = app
        .documents
        .cancel(created.id)
        .await
        .expect("Failed to cancel document");
    assert_eq!(cancelled.status, DocumentStatus::Cancelled);

    // Back to zero, and the zero row persists rather than being deleted
    let balance = get_balance(&app.db, item.id, warehouse.id)
        .await
        .expect("Zero-quantity row persists after reversal");
    assert_eq!(balance.quantity, Decimal::ZERO);
}

#[tokio::test]
async fn cancelling_twice_reports_already_cancelled_and_changes_nothing() {
    let app = setup().await;
    let item = create_test_item(&app.db, "WIRE-02", "Steel wire").await;
    let supplier = create_test_supplier(&app.db, "Volt Supply").await;
    let warehouse = create_test_warehouse(&app.db, "Main").await;

    let created = app
        .documents
        .create(incoming(supplier.id, warehouse.id, &[(item.id, "4")]), test_actor())
        .await
        .unwrap();

    app.documents.cancel(created.id).await.unwrap();

    let err = app.documents.cancel(created.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyCancelled(id) if id == created.id));

    let balance = get_balance(&app.db, item.id, warehouse.id).await.unwrap();
    assert_eq!(balance.quantity, Decimal::ZERO);
}

#[tokio::test]
async fn cancel_fails_when_intervening_activity_consumed_the_stock() {
    let app = setup().await;
    let item = create_test_item(&app.db, "WIRE-03", "Braided wire").await;
    let supplier = create_test_supplier(&app.db, "Volt Supply").await;
    let first = create_test_warehouse(&app.db, "First").await;
    let second = create_test_warehouse(&app.db, "Second").await;

    let receipt = app
        .documents
        .create(incoming(supplier.id, first.id, &[(item.id, "5")]), test_actor())
        .await
        .unwrap();

    app.documents
        .create(transfer(first.id, second.id, &[(item.id, "3")]), test_actor())
        .await
        .unwrap();

    // Reversing the receipt needs 5 at the first warehouse but only 2 remain
    let err = app.documents.cancel(receipt.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The cancellation rolled back: document still Completed, balances intact
    let detail = app
        .documents
        .get_by_id(receipt.id)
        .await
        .unwrap()
        .expect("Document still present");
    assert_eq!(detail.status, DocumentStatus::Completed);

    assert_eq!(
        get_balance(&app.db, item.id, first.id).await.unwrap().quantity,
        dec!(2)
    );
    assert_eq!(
        get_balance(&app.db, item.id, second.id).await.unwrap().quantity,
        dec!(3)
    );
}

#[tokio::test]
async fn production_consumes_materials_and_yields_products() {
    let app = setup().await;
    let material = create_test_item(&app.db, "RESIN-01", "Epoxy resin").await;
    let product = create_test_item(&app.db, "PANEL-01", "Composite panel").await;
    let supplier = create_test_supplier(&app.db, "ChemCo").await;
    let materials_store = create_test_warehouse(&app.db, "Materials").await;
    let finished_goods = create_test_warehouse(&app.db, "Finished goods").await;

    app.documents
        .create(
            incoming(supplier.id, materials_store.id, &[(material.id, "10")]),
            test_actor(),
        )
        .await
        .unwrap();

    let run = app
        .documents
        .create(
            production(
                materials_store.id,
                finished_goods.id,
                &[
                    (material.id, "6", LineDirection::Out),
                    (product.id, "2", LineDirection::In),
                ],
            ),
            test_actor(),
        )
        .await
        .expect("Failed to create production document");

    assert_eq!(
        get_balance(&app.db, material.id, materials_store.id)
            .await
            .unwrap()
            .quantity,
        dec!(4)
    );
    assert_eq!(
        get_balance(&app.db, product.id, finished_goods.id)
            .await
            .unwrap()
            .quantity,
        dec!(2)
    );

    // Cancelling the run returns materials and removes the yielded products
    app.documents.cancel(run.id).await.unwrap();

    assert_eq!(
        get_balance(&app.db, material.id, materials_store.id)
            .await
            .unwrap()
            .quantity,
        dec!(10)
    );
    assert_eq!(
        get_balance(&app.db, product.id, finished_goods.id)
            .await
            .unwrap()
            .quantity,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn numbers_are_sequential_per_document_type() {
    let app = setup().await;
    let item = create_test_item(&app.db, "TUBE-01", "Glass tube").await;
    let supplier = create_test_supplier(&app.db, "GlassWorks").await;
    let a = create_test_warehouse(&app.db, "A").await;
    let b = create_test_warehouse(&app.db, "B").await;

    let first = app
        .documents
        .create(incoming(supplier.id, a.id, &[(item.id, "5")]), test_actor())
        .await
        .unwrap();
    let second = app
        .documents
        .create(incoming(supplier.id, a.id, &[(item.id, "5")]), test_actor())
        .await
        .unwrap();
    let moved = app
        .documents
        .create(transfer(a.id, b.id, &[(item.id, "1")]), test_actor())
        .await
        .unwrap();

    assert_eq!(first.number, "INC-0001");
    assert_eq!(second.number, "INC-0002");
    assert_eq!(moved.number, "TRF-0001");
}

#[tokio::test]
async fn list_filters_by_type_and_status() {
    let app = setup().await;
    let item = create_test_item(&app.db, "TUBE-02", "Steel tube").await;
    let supplier = create_test_supplier(&app.db, "GlassWorks").await;
    let a = create_test_warehouse(&app.db, "A").await;
    let b = create_test_warehouse(&app.db, "B").await;

    let receipt = app
        .documents
        .create(incoming(supplier.id, a.id, &[(item.id, "5")]), test_actor())
        .await
        .unwrap();
    app.documents
        .create(transfer(a.id, b.id, &[(item.id, "2")]), test_actor())
        .await
        .unwrap();
    app.documents.cancel(receipt.id).await.unwrap();

    use stockroom_api::services::documents::DocumentFilter;

    let transfers = app
        .documents
        .list(DocumentFilter {
            document_type: Some(DocumentType::Transfer),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].document_type, DocumentType::Transfer);

    let cancelled = app
        .documents
        .list(DocumentFilter {
            status: Some(DocumentStatus::Cancelled),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, receipt.id);
}
