use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Items::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Items::Name).string().not_null())
                    .col(ColumnDef::new(Items::ItemType).string().not_null())
                    .col(ColumnDef::new(Items::Unit).string().not_null())
                    .col(
                        ColumnDef::new(Items::PurchasePrice)
                            .decimal_len(19, 4)
                            .null(),
                    )
                    .col(ColumnDef::new(Items::SellPrice).decimal_len(19, 4).null())
                    .col(
                        ColumnDef::new(Items::MinQuantity)
                            .decimal_len(19, 4)
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Items::Description).text().null())
                    .col(
                        ColumnDef::new(Items::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Items::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Warehouses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Warehouses::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Warehouses::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Warehouses::Address).string().null())
                    .col(
                        ColumnDef::new(Warehouses::Capacity)
                            .decimal_len(19, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Warehouses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Warehouses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Suppliers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Suppliers::Id)
                            .big_integer()
                            .auto_increment()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Suppliers::Name).string().not_null())
                    .col(ColumnDef::new(Suppliers::Inn).string().null())
                    .col(ColumnDef::new(Suppliers::ContactPerson).string().null())
                    .col(ColumnDef::new(Suppliers::Phone).string().null())
                    .col(ColumnDef::new(Suppliers::Email).string().null())
                    .col(ColumnDef::new(Suppliers::Address).string().null())
                    .col(
                        ColumnDef::new(Suppliers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Suppliers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Suppliers::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Warehouses::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    Code,
    Name,
    ItemType,
    Unit,
    PurchasePrice,
    SellPrice,
    MinQuantity,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Warehouses {
    Table,
    Id,
    Name,
    Address,
    Capacity,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Suppliers {
    Table,
    Id,
    Name,
    Inn,
    ContactPerson,
    Phone,
    Email,
    Address,
    CreatedAt,
    UpdatedAt,
}
