use crate::{
    db::DbPool,
    entities::{
        document::{self, DocumentStatus, DocumentType, Entity as Document},
        document_item::{self, Entity as DocumentItem, LineDirection},
        item,
        supplier::{self, Entity as Supplier},
        warehouse::{self, Entity as Warehouse},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{numbering, stock, stock::StockService},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, SqlErr, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Snapshot of the user creating a document, recorded on the document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentActor {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub document_type: DocumentType,
    pub date: Option<NaiveDate>,
    pub warehouse_from_id: Option<i64>,
    pub warehouse_to_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub comment: Option<String>,
    pub items: Vec<DocumentLineInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentLineInput {
    pub item_id: i64,
    /// Decimal string; validated and parsed before anything is persisted.
    pub quantity: String,
    /// Required on every line of a production document, absent otherwise.
    pub direction: Option<LineDirection>,
    pub price: Option<Decimal>,
}

/// Listing filter. Search/sort/pagination live in the transport layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub supplier_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListItem {
    pub id: i64,
    pub number: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub date: NaiveDate,
    pub warehouse_from_id: Option<i64>,
    pub warehouse_to_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub created_by_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentLineDetail {
    pub id: i64,
    pub item_id: i64,
    pub quantity: Decimal,
    pub direction: Option<LineDirection>,
    pub price: Option<Decimal>,
    pub item_code: String,
    pub item_name: String,
    pub item_unit: String,
}

/// Fully hydrated document as returned from create/cancel/get.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub id: i64,
    pub number: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub date: NaiveDate,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub warehouse_from: Option<EntityRef>,
    pub warehouse_to: Option<EntityRef>,
    pub supplier: Option<EntityRef>,
    pub comment: Option<String>,
    pub items: Vec<DocumentLineDetail>,
}

/// Validated line, quantities parsed. Shared between the create path (from
/// caller input) and the cancel path (replayed from persisted lines).
#[derive(Debug, Clone)]
struct ParsedLine {
    item_id: i64,
    quantity: Decimal,
    direction: Option<LineDirection>,
    price: Option<Decimal>,
}

impl ParsedLine {
    fn from_model(model: &document_item::Model) -> Result<Self, ServiceError> {
        let direction = match model.direction.as_deref() {
            Some(raw) => Some(LineDirection::from_str(raw).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Unknown line direction {:?} on document item {}",
                    raw, model.id
                ))
            })?),
            None => None,
        };

        Ok(Self {
            item_id: model.item_id,
            quantity: model.quantity,
            direction,
            price: model.price,
        })
    }
}

#[derive(FromQueryResult)]
struct LineRow {
    id: i64,
    item_id: i64,
    quantity: Decimal,
    direction: Option<String>,
    price: Option<Decimal>,
    item_code: String,
    item_name: String,
    item_unit: String,
}

/// Service driving the document state machine: create (auto-completed) and
/// cancel (compensating reversal). All stock effects go through
/// [`StockService`] inside the same transaction as the document writes.
#[derive(Clone)]
pub struct DocumentService {
    db_pool: Arc<DbPool>,
    stock: StockService,
    event_sender: Arc<EventSender>,
}

impl DocumentService {
    pub fn new(db_pool: Arc<DbPool>, stock: StockService, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            stock,
            event_sender,
        }
    }

    /// Creates a document in status Completed and applies its stock effects.
    /// Document, lines and ledger mutations commit or roll back together.
    #[instrument(skip(self, request, actor))]
    pub async fn create(
        &self,
        request: CreateDocumentRequest,
        actor: DocumentActor,
    ) -> Result<DocumentDetail, ServiceError> {
        let lines = validate_request(&request)?;

        let db = self.db_pool.as_ref();
        let number = numbering::next_number(db, request.document_type).await?;

        let stock = self.stock.clone();
        let document = db
            .transaction::<_, document::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    let new_document = document::ActiveModel {
                        number: Set(number.clone()),
                        document_type: Set(request.document_type.as_str().to_string()),
                        status: Set(DocumentStatus::Completed.as_str().to_string()),
                        date: Set(request.date.unwrap_or_else(|| now.date_naive())),
                        created_by: Set(actor.user_id),
                        created_by_name: Set(actor.display_name.clone()),
                        warehouse_from_id: Set(request.warehouse_from_id),
                        warehouse_to_id: Set(request.warehouse_to_id),
                        supplier_id: Set(request.supplier_id),
                        comment: Set(request.comment.clone()),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                        ..Default::default()
                    };

                    let document = new_document
                        .insert(txn)
                        .await
                        .map_err(|err| map_number_conflict(err, &number))?;

                    for line in &lines {
                        let new_line = document_item::ActiveModel {
                            document_id: Set(document.id),
                            item_id: Set(line.item_id),
                            quantity: Set(line.quantity),
                            direction: Set(line.direction.map(|d| d.as_str().to_string())),
                            price: Set(line.price),
                            created_at: Set(now.into()),
                            ..Default::default()
                        };

                        new_line
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }

                    apply_stock_effects(&stock, txn, &document, &lines).await?;

                    Ok(document)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::DocumentCreated {
                document_id: document.id,
                number: document.number.clone(),
                document_type: document.document_type.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(
            document_id = document.id,
            number = %document.number,
            document_type = %document.document_type,
            "Document created"
        );

        self.get_by_id(document.id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Document {} missing right after creation",
                document.id
            ))
        })
    }

    /// Cancels a completed document, applying the exact inverse of its stock
    /// effects. Reversal is mechanical replay of the persisted lines; if an
    /// inverse decrease would drive a balance negative the whole cancellation
    /// rolls back and the document stays Completed.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64) -> Result<DocumentDetail, ServiceError> {
        let db = self.db_pool.as_ref();

        let document = Document::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Document {} not found", id)))?;

        if document.status == DocumentStatus::Cancelled.as_str() {
            return Err(ServiceError::AlreadyCancelled(id));
        }

        let line_models = DocumentItem::find()
            .filter(document_item::Column::DocumentId.eq(id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let lines = line_models
            .iter()
            .map(ParsedLine::from_model)
            .collect::<Result<Vec<_>, _>>()?;

        let stock = self.stock.clone();
        let doc = document.clone();
        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let mut active: document::ActiveModel = doc.clone().into();
                active.status = Set(DocumentStatus::Cancelled.as_str().to_string());
                active.updated_at = Set(Utc::now().into());
                active.update(txn).await.map_err(ServiceError::db_error)?;

                reverse_stock_effects(&stock, txn, &doc, &lines).await
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })?;

        self.event_sender
            .send(Event::DocumentCancelled {
                document_id: document.id,
                number: document.number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(document_id = document.id, number = %document.number, "Document cancelled");

        self.get_by_id(id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!("Document {} missing after cancellation", id))
        })
    }

    /// Loads a document with its lines and resolved supplier/warehouse names.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<DocumentDetail>, ServiceError> {
        let db = self.db_pool.as_ref();

        let Some(document) = Document::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };

        let rows = DocumentItem::find()
            .filter(document_item::Column::DocumentId.eq(id))
            .join(JoinType::InnerJoin, document_item::Relation::Item.def())
            .select_only()
            .column(document_item::Column::Id)
            .column(document_item::Column::ItemId)
            .column(document_item::Column::Quantity)
            .column(document_item::Column::Direction)
            .column(document_item::Column::Price)
            .column_as(item::Column::Code, "item_code")
            .column_as(item::Column::Name, "item_name")
            .column_as(item::Column::Unit, "item_unit")
            .order_by_asc(document_item::Column::Id)
            .into_model::<LineRow>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let direction = match row.direction.as_deref() {
                Some(raw) => Some(LineDirection::from_str(raw).ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Unknown line direction {:?} on document item {}",
                        raw, row.id
                    ))
                })?),
                None => None,
            };
            items.push(DocumentLineDetail {
                id: row.id,
                item_id: row.item_id,
                quantity: row.quantity,
                direction,
                price: row.price,
                item_code: row.item_code,
                item_name: row.item_name,
                item_unit: row.item_unit,
            });
        }

        let supplier = match document.supplier_id {
            Some(supplier_id) => Supplier::find_by_id(supplier_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .map(|s| EntityRef {
                    id: s.id,
                    name: s.name,
                }),
            None => None,
        };

        let warehouse_from = self.warehouse_ref(document.warehouse_from_id).await?;
        let warehouse_to = self.warehouse_ref(document.warehouse_to_id).await?;

        Ok(Some(DocumentDetail {
            id: document.id,
            number: document.number,
            document_type: parse_document_type(&document.document_type)?,
            status: parse_document_status(&document.status)?,
            date: document.date,
            created_by: document.created_by,
            created_by_name: document.created_by_name,
            warehouse_from,
            warehouse_to,
            supplier,
            comment: document.comment,
            items,
        }))
    }

    /// Lists documents matching `filter`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: DocumentFilter) -> Result<Vec<DocumentListItem>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = Document::find();
        if let Some(document_type) = filter.document_type {
            query = query.filter(document::Column::DocumentType.eq(document_type.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(document::Column::Status.eq(status.as_str()));
        }
        if let Some(date_from) = filter.date_from {
            query = query.filter(document::Column::Date.gte(date_from));
        }
        if let Some(date_to) = filter.date_to {
            query = query.filter(document::Column::Date.lte(date_to));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(document::Column::SupplierId.eq(supplier_id));
        }

        let documents = query
            .order_by_desc(document::Column::Date)
            .order_by_desc(document::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        documents
            .into_iter()
            .map(|doc| {
                Ok(DocumentListItem {
                    id: doc.id,
                    number: doc.number,
                    document_type: parse_document_type(&doc.document_type)?,
                    status: parse_document_status(&doc.status)?,
                    date: doc.date,
                    warehouse_from_id: doc.warehouse_from_id,
                    warehouse_to_id: doc.warehouse_to_id,
                    supplier_id: doc.supplier_id,
                    created_by_name: doc.created_by_name,
                })
            })
            .collect()
    }

    async fn warehouse_ref(&self, id: Option<i64>) -> Result<Option<EntityRef>, ServiceError> {
        let Some(id) = id else {
            return Ok(None);
        };

        Ok(Warehouse::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .map(|w| EntityRef {
                id: w.id,
                name: w.name,
            }))
    }
}

/// Type-specific request validation. Returns the parsed lines so quantities
/// are checked exactly once, before anything is persisted.
fn validate_request(request: &CreateDocumentRequest) -> Result<Vec<ParsedLine>, ServiceError> {
    if request.items.is_empty() {
        return Err(ServiceError::InvalidDocument(
            "At least one item is required".to_string(),
        ));
    }

    match request.document_type {
        DocumentType::Incoming => {
            if request.supplier_id.is_none() {
                return Err(ServiceError::InvalidDocument(
                    "Supplier is required for incoming documents".to_string(),
                ));
            }
            if request.warehouse_to_id.is_none() {
                return Err(ServiceError::InvalidDocument(
                    "Warehouse To is required for incoming documents".to_string(),
                ));
            }
        }
        DocumentType::Transfer => {
            if request.warehouse_from_id.is_none() || request.warehouse_to_id.is_none() {
                return Err(ServiceError::InvalidDocument(
                    "Both warehouses are required for transfer documents".to_string(),
                ));
            }
        }
        DocumentType::Production => {
            if request.warehouse_from_id.is_none() || request.warehouse_to_id.is_none() {
                return Err(ServiceError::InvalidDocument(
                    "Both warehouses are required for production documents".to_string(),
                ));
            }
            if request.items.iter().any(|line| line.direction.is_none()) {
                return Err(ServiceError::InvalidDocument(
                    "Direction is required for all items in production documents".to_string(),
                ));
            }
        }
    }

    request
        .items
        .iter()
        .map(|line| {
            Ok(ParsedLine {
                item_id: line.item_id,
                quantity: stock::parse_quantity(&line.quantity)?,
                direction: line.direction,
                price: line.price,
            })
        })
        .collect()
}

/// Applies the type-specific ledger deltas for a freshly created document.
async fn apply_stock_effects<C: sea_orm::ConnectionTrait>(
    stock: &StockService,
    conn: &C,
    document: &document::Model,
    lines: &[ParsedLine],
) -> Result<(), ServiceError> {
    match parse_document_type(&document.document_type)? {
        DocumentType::Incoming => {
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                stock
                    .increase(
                        conn,
                        warehouse_to,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
            }
        }
        DocumentType::Transfer => {
            let warehouse_from = require_warehouse(document.warehouse_from_id, "warehouse_from")?;
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                stock
                    .decrease(
                        conn,
                        warehouse_from,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
                stock
                    .increase(
                        conn,
                        warehouse_to,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
            }
        }
        DocumentType::Production => {
            let warehouse_from = require_warehouse(document.warehouse_from_id, "warehouse_from")?;
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                match line.direction {
                    Some(LineDirection::Out) => {
                        stock
                            .decrease(
                                conn,
                                warehouse_from,
                                line.item_id,
                                line.quantity,
                                Some(document.id),
                                None,
                            )
                            .await?;
                    }
                    Some(LineDirection::In) => {
                        stock
                            .increase(
                                conn,
                                warehouse_to,
                                line.item_id,
                                line.quantity,
                                Some(document.id),
                                None,
                            )
                            .await?;
                    }
                    None => {
                        return Err(ServiceError::InvalidDocument(
                            "Direction is required for all items in production documents"
                                .to_string(),
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Applies the exact inverse of [`apply_stock_effects`] when a document is
/// cancelled. No business rules are re-validated here; the recorded lines are
/// replayed mechanically.
async fn reverse_stock_effects<C: sea_orm::ConnectionTrait>(
    stock: &StockService,
    conn: &C,
    document: &document::Model,
    lines: &[ParsedLine],
) -> Result<(), ServiceError> {
    match parse_document_type(&document.document_type)? {
        DocumentType::Incoming => {
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                stock
                    .decrease(
                        conn,
                        warehouse_to,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
            }
        }
        DocumentType::Transfer => {
            let warehouse_from = require_warehouse(document.warehouse_from_id, "warehouse_from")?;
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                stock
                    .increase(
                        conn,
                        warehouse_from,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
                stock
                    .decrease(
                        conn,
                        warehouse_to,
                        line.item_id,
                        line.quantity,
                        Some(document.id),
                        None,
                    )
                    .await?;
            }
        }
        DocumentType::Production => {
            let warehouse_from = require_warehouse(document.warehouse_from_id, "warehouse_from")?;
            let warehouse_to = require_warehouse(document.warehouse_to_id, "warehouse_to")?;
            for line in lines {
                match line.direction {
                    Some(LineDirection::Out) => {
                        stock
                            .increase(
                                conn,
                                warehouse_from,
                                line.item_id,
                                line.quantity,
                                Some(document.id),
                                None,
                            )
                            .await?;
                    }
                    Some(LineDirection::In) => {
                        stock
                            .decrease(
                                conn,
                                warehouse_to,
                                line.item_id,
                                line.quantity,
                                Some(document.id),
                                None,
                            )
                            .await?;
                    }
                    None => {
                        return Err(ServiceError::InternalError(format!(
                            "Production document {} has a line without direction",
                            document.id
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn require_warehouse(value: Option<i64>, field: &str) -> Result<i64, ServiceError> {
    value.ok_or_else(|| {
        ServiceError::InvalidDocument(format!("Missing {} on document", field))
    })
}

fn parse_document_type(raw: &str) -> Result<DocumentType, ServiceError> {
    DocumentType::from_str(raw)
        .ok_or_else(|| ServiceError::InternalError(format!("Unknown document type: {}", raw)))
}

fn parse_document_status(raw: &str) -> Result<DocumentStatus, ServiceError> {
    DocumentStatus::from_str(raw)
        .ok_or_else(|| ServiceError::InternalError(format!("Unknown document status: {}", raw)))
}

/// A unique-constraint violation on `documents.number` means the numbering
/// race was lost to a concurrent creator; the caller may retry the whole
/// operation for a fresh number.
fn map_number_conflict(err: DbErr, number: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::DuplicateNumber(format!(
            "Number {} was taken by a concurrent document; retry",
            number
        )),
        _ => ServiceError::db_error(err),
    }
}
