//! Invoice issuance service.
//!
//! Invoicing never touches product or reservation stock; it only records a
//! billing document with a generated number.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::invoice::{self, Entity as InvoiceEntity, InvoiceStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceCommand {
    pub product_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Formats an invoice number from the invoice date and the current row count.
fn format_invoice_number(invoice_date: NaiveDate, existing_count: u64) -> String {
    format!(
        "INV-{}-{:04}",
        invoice_date.format("%Y%m%d"),
        existing_count + 1
    )
}

/// Service for issuing and managing invoices.
#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a draft invoice with a generated `INV-{YYYYMMDD}-{seq}` number.
    ///
    /// The sequence is the current invoice row count, read and formatted in
    /// the same transaction as the insert. Two concurrent creations can still
    /// read the same count; the unique index on invoice_number rejects the
    /// loser rather than letting a duplicate number through.
    #[instrument(skip(self, command))]
    pub async fn create_invoice(
        &self,
        command: CreateInvoiceCommand,
    ) -> Result<invoice::Model, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Invoice quantity must be greater than 0".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let created = db
            .transaction::<_, invoice::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing_count = InvoiceEntity::find()
                        .count(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let invoice_number =
                        format_invoice_number(command.invoice_date, existing_count);

                    let active = invoice::ActiveModel {
                        product_id: Set(command.product_id),
                        reservation_id: Set(command.reservation_id),
                        client_id: Set(command.client_id),
                        invoice_number: Set(invoice_number),
                        quantity: Set(command.quantity),
                        unit_price: Set(command.unit_price),
                        total_amount: Set(command.total_amount),
                        invoice_date: Set(command.invoice_date),
                        due_date: Set(command.due_date),
                        status: Set(InvoiceStatus::Draft.to_string()),
                        notes: Set(command.notes.clone()),
                        ..Default::default()
                    };

                    active.insert(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::InvoiceCreated {
                invoice_id: created.id,
                invoice_number: created.invoice_number.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(
            invoice_id = %created.id,
            invoice_number = %created.invoice_number,
            "Created invoice"
        );

        Ok(created)
    }

    /// Status-only mutation; no cross-entity effects.
    #[instrument(skip(self))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<invoice::Model, ServiceError> {
        let db = &*self.db_pool;

        let existing = InvoiceEntity::find_by_id(invoice_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        let old_status = existing.status.clone();
        let mut active: invoice::ActiveModel = existing.into();
        active.status = Set(status.to_string());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::InvoiceStatusChanged {
                invoice_id,
                old_status,
                new_status: updated.status.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(invoice_id = %invoice_id, status = %updated.status, "Updated invoice status");

        Ok(updated)
    }

    /// Deletes an invoice. No quantity side effects.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = InvoiceEntity::delete_by_id(invoice_id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Invoice {} not found",
                invoice_id
            )));
        }

        self.event_sender
            .send(Event::InvoiceDeleted(invoice_id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(invoice_id = %invoice_id, "Deleted invoice");

        Ok(())
    }

    /// Gets an invoice by ID.
    #[instrument(skip(self))]
    pub async fn get_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<invoice::Model>, ServiceError> {
        let db = &*self.db_pool;

        InvoiceEntity::find_by_id(invoice_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists invoices with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<invoice::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let paginator = InvoiceEntity::find()
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let models = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((models, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_embeds_date_and_padded_sequence() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 9).unwrap();
        assert_eq!(format_invoice_number(date, 0), "INV-20241209-0001");
        assert_eq!(format_invoice_number(date, 41), "INV-20241209-0042");
        // sequences past four digits widen rather than truncate
        assert_eq!(format_invoice_number(date, 99_999), "INV-20241209-100000");
    }
}
