#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use stockroom_api::{
    db::{establish_connection, run_migrations, DbPool},
    entities::{
        item::{self, ItemType},
        stock_balance::{self, Entity as StockBalance},
        supplier, warehouse,
    },
    events::{Event, EventSender},
    services::{documents::DocumentActor, documents::DocumentService, stock::StockService},
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub stock: StockService,
    pub documents: DocumentService,
    // Keeps the event channel open for the lifetime of the test
    _events: mpsc::Receiver<Event>,
}

/// Fresh in-memory database per test, with migrations applied and services
/// wired the way an embedding application would wire them.
pub async fn setup() -> TestApp {
    let url = format!(
        "sqlite:file:{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let db = Arc::new(
        establish_connection(&url)
            .await
            .expect("Failed to create DB pool"),
    );
    run_migrations(db.as_ref())
        .await
        .expect("Failed to run migrations");

    let (tx, rx) = mpsc::channel(100);
    let event_sender = Arc::new(EventSender::new(tx));
    let stock = StockService::new(db.clone(), event_sender.clone());
    let documents = DocumentService::new(db.clone(), stock.clone(), event_sender);

    TestApp {
        db,
        stock,
        documents,
        _events: rx,
    }
}

pub fn test_actor() -> DocumentActor {
    DocumentActor {
        user_id: Uuid::new_v4(),
        display_name: "Test Operator".to_string(),
    }
}

pub async fn create_test_item(db: &DbPool, code: &str, name: &str) -> item::Model {
    let item = item::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        item_type: Set(ItemType::Material.as_str().to_string()),
        unit: Set("pcs".to_string()),
        min_quantity: Set(Decimal::ZERO),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };

    item.insert(db).await.expect("Failed to create item")
}

pub async fn create_test_warehouse(db: &DbPool, name: &str) -> warehouse::Model {
    let warehouse = warehouse::ActiveModel {
        name: Set(name.to_string()),
        address: Set(Some("1 Dock Road".to_string())),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };

    warehouse
        .insert(db)
        .await
        .expect("Failed to create warehouse")
}

pub async fn create_test_supplier(db: &DbPool, name: &str) -> supplier::Model {
    let supplier = supplier::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };

    supplier
        .insert(db)
        .await
        .expect("Failed to create supplier")
}

pub async fn get_balance(
    db: &DbPool,
    item_id: i64,
    warehouse_id: i64,
) -> Option<stock_balance::Model> {
    StockBalance::find_by_id((item_id, warehouse_id))
        .one(db)
        .await
        .expect("Failed to query stock balance")
}
