use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Documents::Number)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Documents::DocumentType).string().not_null())
                    .col(ColumnDef::new(Documents::Status).string().not_null())
                    .col(ColumnDef::new(Documents::Date).date().not_null())
                    .col(ColumnDef::new(Documents::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Documents::CreatedByName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Documents::WarehouseFromId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Documents::WarehouseToId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Documents::SupplierId).big_integer().null())
                    .col(ColumnDef::new(Documents::Comment).text().null())
                    .col(
                        ColumnDef::new(Documents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Documents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_documents_warehouse_from")
                            .from(Documents::Table, Documents::WarehouseFromId)
                            .to(Warehouses::Table, Warehouses::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_documents_warehouse_to")
                            .from(Documents::Table, Documents::WarehouseToId)
                            .to(Warehouses::Table, Warehouses::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_documents_supplier")
                            .from(Documents::Table, Documents::SupplierId)
                            .to(Suppliers::Table, Suppliers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Numbering scans the latest document per type in id order
        manager
            .create_index(
                Index::create()
                    .name("idx_documents_type_id")
                    .table(Documents::Table)
                    .col(Documents::DocumentType)
                    .col(Documents::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DocumentItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DocumentItems::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DocumentItems::DocumentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DocumentItems::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DocumentItems::Quantity)
                            .decimal_len(19, 4)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DocumentItems::Direction).string().null())
                    .col(
                        ColumnDef::new(DocumentItems::Price)
                            .decimal_len(19, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DocumentItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_document_items_document")
                            .from(DocumentItems::Table, DocumentItems::DocumentId)
                            .to(Documents::Table, Documents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_document_items_item")
                            .from(DocumentItems::Table, DocumentItems::ItemId)
                            .to(Items::Table, Items::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_document_items_document_id")
                    .table(DocumentItems::Table)
                    .col(DocumentItems::DocumentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DocumentItems::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    Number,
    DocumentType,
    Status,
    Date,
    CreatedBy,
    CreatedByName,
    WarehouseFromId,
    WarehouseToId,
    SupplierId,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DocumentItems {
    Table,
    Id,
    DocumentId,
    ItemId,
    Quantity,
    Direction,
    Price,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Warehouses {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Suppliers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
}
