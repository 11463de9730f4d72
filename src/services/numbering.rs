//! Sequential human-readable document numbers, one sequence per document
//! type: `INC-0001`, `TRF-0001`, `PRD-0001`, ...
//!
//! The read-increment-write cycle is intentionally not locked; concurrent
//! creators of the same type race, and the unique constraint on
//! `documents.number` turns a lost race into a retryable
//! [`ServiceError::DuplicateNumber`](crate::errors::ServiceError) at insert
//! time.

use crate::entities::document::{self, DocumentType, Entity as Document};
use crate::errors::ServiceError;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").expect("valid regex"));

pub fn number_prefix(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Incoming => "INC",
        DocumentType::Transfer => "TRF",
        DocumentType::Production => "PRD",
    }
}

/// Returns the next number for `document_type`, derived from the most
/// recently inserted document of that type.
pub async fn next_number<C: ConnectionTrait>(
    conn: &C,
    document_type: DocumentType,
) -> Result<String, ServiceError> {
    let last = Document::find()
        .filter(document::Column::DocumentType.eq(document_type.as_str()))
        .order_by_desc(document::Column::Id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let sequence = next_sequence(last.as_ref().map(|doc| doc.number.as_str()));

    Ok(format!("{}-{:04}", number_prefix(document_type), sequence))
}

fn next_sequence(last_number: Option<&str>) -> u64 {
    last_number
        .and_then(|number| TRAILING_DIGITS.captures(number))
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .map(|sequence| sequence + 1)
        .unwrap_or(1)
}
