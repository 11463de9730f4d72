use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of inventory documents handled by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Goods received from a supplier into a warehouse.
    Incoming,
    /// Goods moved between two warehouses.
    Transfer,
    /// Materials consumed and products yielded by a production run.
    Production,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Incoming => "incoming",
            DocumentType::Transfer => "transfer",
            DocumentType::Production => "production",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "incoming" => Some(DocumentType::Incoming),
            "transfer" => Some(DocumentType::Transfer),
            "production" => Some(DocumentType::Production),
            _ => None,
        }
    }
}

/// Lifecycle status of a document. Documents are auto-completed on creation;
/// Draft exists for forward compatibility but is never written by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Completed,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DocumentStatus::Draft),
            "completed" => Some(DocumentStatus::Completed),
            "cancelled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub number: String,
    pub document_type: String,
    pub status: String,
    pub date: Date,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub warehouse_from_id: Option<i64>,
    pub warehouse_to_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub comment: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_item::Entity")]
    DocumentItem,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::document_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentItem.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
