use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockBalances::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockBalances::WarehouseId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockBalances::Quantity)
                            .decimal_len(19, 4)
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(StockBalances::Reserved)
                            .decimal_len(19, 4)
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(StockBalances::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_stock_balances")
                            .col(StockBalances::ItemId)
                            .col(StockBalances::WarehouseId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_balances_item")
                            .from(StockBalances::Table, StockBalances::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_balances_warehouse")
                            .from(StockBalances::Table, StockBalances::WarehouseId)
                            .to(Warehouses::Table, Warehouses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Audit trail of every ledger mutation
        manager
            .create_table(
                Table::create()
                    .table(StockMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMovements::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::WarehouseId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::MovementType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::Quantity)
                            .decimal_len(19, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::PreviousQuantity)
                            .decimal_len(19, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::NewQuantity)
                            .decimal_len(19, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::DocumentId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(StockMovements::Reason).string().null())
                    .col(
                        ColumnDef::new(StockMovements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_movements_item_warehouse")
                    .table(StockMovements::Table)
                    .col(StockMovements::ItemId)
                    .col(StockMovements::WarehouseId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockMovements::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StockBalances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockBalances {
    Table,
    ItemId,
    WarehouseId,
    Quantity,
    Reserved,
    LastUpdated,
}

#[derive(DeriveIden)]
enum StockMovements {
    Table,
    Id,
    ItemId,
    WarehouseId,
    MovementType,
    Quantity,
    PreviousQuantity,
    NewQuantity,
    DocumentId,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Warehouses {
    Table,
    Id,
}
