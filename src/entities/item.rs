use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of catalog item: raw material consumed by production, or a sellable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Material,
    Product,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Material => "material",
            ItemType::Product => "product",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "material" => Some(ItemType::Material),
            "product" => Some(ItemType::Product),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub item_type: String,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub purchase_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sell_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub min_quantity: Decimal,
    pub description: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_item::Entity")]
    DocumentItem,
    #[sea_orm(has_many = "super::stock_balance::Entity")]
    StockBalance,
}

impl Related<super::document_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentItem.def()
    }
}

impl Related<super::stock_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBalance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
