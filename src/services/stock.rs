use crate::{
    db::DbPool,
    entities::{
        item,
        stock_balance::{self, Entity as StockBalance},
        stock_movement::{self, MovementType},
        warehouse,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// Manual correction applied outside any document workflow. The quantity
/// arrives as a decimal string and is validated before any row is touched.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub quantity: String,
    pub direction: AdjustmentDirection,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockBalanceFilter {
    pub warehouse_id: Option<i64>,
    pub item_id: Option<i64>,
}

/// Balance row with resolved names, as exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct StockBalanceView {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub item_id: i64,
    pub item_name: String,
    pub quantity: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
}

#[derive(Debug, FromQueryResult)]
struct BalanceRow {
    warehouse_id: i64,
    warehouse_name: String,
    item_id: i64,
    item_name: String,
    quantity: Decimal,
    reserved: Decimal,
}

/// The stock ledger: the only writer of `stock_balances`. Balances are
/// mutated exclusively through [`increase`](StockService::increase),
/// [`decrease`](StockService::decrease) and the standalone
/// [`adjust`](StockService::adjust) entry point.
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Adds `amount` to the balance of `item_id` at `warehouse_id`, creating
    /// the balance row on first positive mutation. Runs on the caller's
    /// connection so a document workflow threads one transaction through
    /// ledger and document writes.
    pub async fn increase<C: ConnectionTrait>(
        &self,
        conn: &C,
        warehouse_id: i64,
        item_id: i64,
        amount: Decimal,
        document_id: Option<i64>,
        reason: Option<String>,
    ) -> Result<stock_balance::Model, ServiceError> {
        ensure_positive(amount)?;

        let existing = StockBalance::find_by_id((item_id, warehouse_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let (previous, updated) = match existing {
            Some(balance) => {
                let previous = balance.quantity;
                let mut active: stock_balance::ActiveModel = balance.into();
                active.quantity = Set(previous + amount);
                active.last_updated = Set(Utc::now().into());

                let updated = active.update(conn).await.map_err(ServiceError::db_error)?;
                (previous, updated)
            }
            None => {
                let new_balance = stock_balance::ActiveModel {
                    item_id: Set(item_id),
                    warehouse_id: Set(warehouse_id),
                    quantity: Set(amount),
                    reserved: Set(Decimal::ZERO),
                    last_updated: Set(Utc::now().into()),
                };

                let created = new_balance
                    .insert(conn)
                    .await
                    .map_err(ServiceError::db_error)?;
                (Decimal::ZERO, created)
            }
        };

        self.record_movement(
            conn,
            &updated,
            MovementType::Increase,
            amount,
            previous,
            document_id,
            reason,
        )
        .await?;

        Ok(updated)
    }

    /// Subtracts `amount` from the balance of `item_id` at `warehouse_id`.
    /// This is the sole non-negativity enforcement point: the operation fails
    /// with `InsufficientStock` when the row is absent or the result would be
    /// negative, and the balance is left untouched.
    pub async fn decrease<C: ConnectionTrait>(
        &self,
        conn: &C,
        warehouse_id: i64,
        item_id: i64,
        amount: Decimal,
        document_id: Option<i64>,
        reason: Option<String>,
    ) -> Result<stock_balance::Model, ServiceError> {
        ensure_positive(amount)?;

        let balance = StockBalance::find_by_id((item_id, warehouse_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::InsufficientStock(format!(
                    "No stock of item {} at warehouse {}",
                    item_id, warehouse_id
                ))
            })?;

        let previous = balance.quantity;
        let remaining = previous - amount;
        if remaining < Decimal::ZERO {
            return Err(ServiceError::InsufficientStock(format!(
                "Available: {}, required: {} for item {} at warehouse {}",
                previous, amount, item_id, warehouse_id
            )));
        }

        let mut active: stock_balance::ActiveModel = balance.into();
        active.quantity = Set(remaining);
        active.last_updated = Set(Utc::now().into());

        let updated = active.update(conn).await.map_err(ServiceError::db_error)?;

        self.record_movement(
            conn,
            &updated,
            MovementType::Decrease,
            amount,
            previous,
            document_id,
            reason,
        )
        .await?;

        Ok(updated)
    }

    /// Manual correction entry point. Opens its own transaction because it is
    /// not part of a larger document workflow.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<stock_balance::Model, ServiceError> {
        let amount = parse_quantity(&adjustment.quantity)?;

        let service = self.clone();
        let adj = adjustment.clone();
        let updated = self
            .db_pool
            .transaction::<_, stock_balance::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    match adj.direction {
                        AdjustmentDirection::Increase => {
                            service
                                .increase(
                                    txn,
                                    adj.warehouse_id,
                                    adj.item_id,
                                    amount,
                                    None,
                                    Some(adj.reason.clone()),
                                )
                                .await
                        }
                        AdjustmentDirection::Decrease => {
                            service
                                .decrease(
                                    txn,
                                    adj.warehouse_id,
                                    adj.item_id,
                                    amount,
                                    None,
                                    Some(adj.reason.clone()),
                                )
                                .await
                        }
                    }
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::StockAdjusted {
                item_id: updated.item_id,
                warehouse_id: updated.warehouse_id,
                movement_type: match adjustment.direction {
                    AdjustmentDirection::Increase => MovementType::Increase.as_str().to_string(),
                    AdjustmentDirection::Decrease => MovementType::Decrease.as_str().to_string(),
                },
                quantity: amount,
                new_quantity: updated.quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(
            item_id = updated.item_id,
            warehouse_id = updated.warehouse_id,
            new_quantity = %updated.quantity,
            "Stock adjusted"
        );

        Ok(updated)
    }

    /// Lists balances with item/warehouse names resolved, optionally filtered
    /// by warehouse and/or item.
    #[instrument(skip(self))]
    pub async fn get_balances(
        &self,
        filter: StockBalanceFilter,
    ) -> Result<Vec<StockBalanceView>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockBalance::find()
            .join(JoinType::InnerJoin, stock_balance::Relation::Item.def())
            .join(JoinType::InnerJoin, stock_balance::Relation::Warehouse.def())
            .select_only()
            .column(stock_balance::Column::WarehouseId)
            .column_as(warehouse::Column::Name, "warehouse_name")
            .column(stock_balance::Column::ItemId)
            .column_as(item::Column::Name, "item_name")
            .column(stock_balance::Column::Quantity)
            .column(stock_balance::Column::Reserved)
            .order_by_asc(stock_balance::Column::WarehouseId)
            .order_by_asc(stock_balance::Column::ItemId);

        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_balance::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(item_id) = filter.item_id {
            query = query.filter(stock_balance::Column::ItemId.eq(item_id));
        }

        let rows = query
            .into_model::<BalanceRow>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| StockBalanceView {
                warehouse_id: row.warehouse_id,
                warehouse_name: row.warehouse_name,
                item_id: row.item_id,
                item_name: row.item_name,
                quantity: row.quantity,
                reserved: row.reserved,
                available: row.quantity - row.reserved,
            })
            .collect())
    }

    async fn record_movement<C: ConnectionTrait>(
        &self,
        conn: &C,
        balance: &stock_balance::Model,
        movement_type: MovementType,
        amount: Decimal,
        previous: Decimal,
        document_id: Option<i64>,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let movement = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(balance.item_id),
            warehouse_id: Set(balance.warehouse_id),
            movement_type: Set(movement_type.as_str().to_string()),
            quantity: Set(amount),
            previous_quantity: Set(previous),
            new_quantity: Set(balance.quantity),
            document_id: Set(document_id),
            reason: Set(reason),
            created_at: Set(Utc::now()),
        };

        movement
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(())
    }
}

/// Parses a decimal quantity string, rejecting non-numeric and non-positive
/// input before any row is touched.
pub(crate) fn parse_quantity(raw: &str) -> Result<Decimal, ServiceError> {
    let amount = Decimal::from_str(raw.trim()).map_err(|_| {
        ServiceError::InvalidQuantity(format!("Not a decimal quantity: {:?}", raw))
    })?;
    ensure_positive(amount)?;
    Ok(amount)
}

fn ensure_positive(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::InvalidQuantity(format!(
            "Quantity must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_quantity_accepts_positive_decimals() {
        assert_eq!(parse_quantity("5").unwrap(), dec!(5));
        assert_eq!(parse_quantity("0.001").unwrap(), dec!(0.001));
        assert_eq!(parse_quantity(" 12.50 ").unwrap(), dec!(12.50));
    }

    #[test]
    fn parse_quantity_rejects_garbage() {
        assert!(matches!(
            parse_quantity("abc"),
            Err(ServiceError::InvalidQuantity(_))
        ));
        assert!(matches!(
            parse_quantity(""),
            Err(ServiceError::InvalidQuantity(_))
        ));
        assert!(matches!(
            parse_quantity("1.2.3"),
            Err(ServiceError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn parse_quantity_rejects_non_positive() {
        assert!(matches!(
            parse_quantity("0"),
            Err(ServiceError::InvalidQuantity(_))
        ));
        assert!(matches!(
            parse_quantity("-3"),
            Err(ServiceError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn ensure_positive_boundary() {
        assert!(ensure_positive(dec!(0.0001)).is_ok());
        assert!(ensure_positive(Decimal::ZERO).is_err());
        assert!(ensure_positive(dec!(-0.0001)).is_err());
    }
}
