//! Reservation reconciliation service.
//!
//! Every operation here moves quantity between a product and a reservation in
//! a single transaction: a reservation's units are deducted from the product
//! eagerly at creation time (not at confirmation) and returned on deletion.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::client;
use crate::entities::reservation::{self, Entity as ReservationEntity, ReservationStatus};
use crate::errors::ServiceError;
use crate::events::{DamageTarget, Event, EventSender};
use crate::services::stock::{apply_product_delta, ensure_available, load_product};
use crate::services::MAX_CAS_ATTEMPTS;

/// The client a reservation is held for: an existing row or identity fields
/// for a client created ad hoc inside the reservation transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientRef {
    Existing(Uuid),
    New {
        name: String,
        phone: Option<String>,
        address: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationCommand {
    pub product_id: Uuid,
    pub client: ClientRef,
    pub quantity: i32,
    pub size: Option<String>,
    pub location: Option<String>,
    pub reserved_for: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReservationCommand {
    pub reservation_id: Uuid,
    pub product_id: Uuid,
    pub client_id: Option<Uuid>,
    pub quantity: i32,
    pub size: Option<String>,
    pub location: Option<String>,
    pub reserved_for: Option<NaiveDate>,
    pub status: ReservationStatus,
}

/// Result of create-or-merge: the persisted reservation and whether the
/// requested quantity was merged into an existing pending hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrMergeOutcome {
    pub reservation: reservation::Model,
    pub merged: bool,
}

/// Service for managing reservations and their product-stock reconciliation.
#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a reservation, or merges into an existing *pending* reservation
    /// with the same (product, client, size, date). The product is debited by
    /// the additional quantity only.
    #[instrument(skip(self, command))]
    pub async fn create_or_merge_reservation(
        &self,
        command: CreateReservationCommand,
    ) -> Result<CreateOrMergeOutcome, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity must be greater than 0".to_string(),
            ));
        }

        let outcome = self
            .with_cas_retry(|| self.try_create_or_merge(command.clone()))
            .await?;

        if outcome.merged {
            self.event_sender
                .send(Event::ReservationMerged {
                    reservation_id: outcome.reservation.id,
                    added_quantity: command.quantity,
                    merged_quantity: outcome.reservation.quantity,
                })
                .await
                .map_err(ServiceError::EventError)?;
        } else {
            self.event_sender
                .send(Event::ReservationCreated(outcome.reservation.id))
                .await
                .map_err(ServiceError::EventError)?;
        }

        info!(
            reservation_id = %outcome.reservation.id,
            quantity = command.quantity,
            merged = outcome.merged,
            "Reserved stock"
        );

        Ok(outcome)
    }

    async fn try_create_or_merge(
        &self,
        command: CreateReservationCommand,
    ) -> Result<CreateOrMergeOutcome, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, CreateOrMergeOutcome, ServiceError>(move |txn| {
            Box::pin(async move {
                let product = load_product(txn, command.product_id).await?;
                ensure_available(&product, command.quantity)?;

                let (client_id, client_name, client_phone, client_address) =
                    resolve_client(txn, &command.client).await?;

                let existing = find_pending_match(
                    txn,
                    product.id,
                    client_id,
                    command.size.as_deref(),
                    command.reserved_for,
                )
                .await?;

                let now = Utc::now();
                let (model, merged) = match existing {
                    Some(found) => {
                        let merged_quantity = found.quantity + command.quantity;
                        let mut active: reservation::ActiveModel = found.into();
                        active.quantity = Set(merged_quantity);
                        active.reserved_at = Set(now);
                        let updated =
                            active.update(txn).await.map_err(ServiceError::db_error)?;
                        (updated, true)
                    }
                    None => {
                        let active = reservation::ActiveModel {
                            product_id: Set(Some(product.id)),
                            product_name: Set(product.name.clone()),
                            client_id: Set(client_id),
                            client_name: Set(client_name),
                            client_phone: Set(client_phone),
                            client_address: Set(client_address),
                            quantity: Set(command.quantity),
                            size: Set(command.size.clone()),
                            location: Set(command.location.clone()),
                            reserved_for: Set(command.reserved_for),
                            status: Set(ReservationStatus::Pending.to_string()),
                            reserved_at: Set(now),
                            ..Default::default()
                        };
                        let inserted =
                            active.insert(txn).await.map_err(ServiceError::db_error)?;
                        (inserted, false)
                    }
                };

                // Debit only the additional quantity, never the merged total.
                apply_product_delta(txn, &product, -command.quantity, 0).await?;

                Ok(CreateOrMergeOutcome {
                    reservation: model,
                    merged,
                })
            })
        })
        .await
        .map_err(map_txn_err)
    }

    /// Updates a reservation's fields, reconciling product stock for quantity
    /// deltas and product switches. All-or-nothing: an insufficient-stock
    /// failure on the new product rolls back the credit to the old one.
    #[instrument(skip(self, command))]
    pub async fn update_reservation(
        &self,
        command: UpdateReservationCommand,
    ) -> Result<reservation::Model, ServiceError> {
        if command.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity cannot be negative".to_string(),
            ));
        }

        let updated = self
            .with_cas_retry(|| self.try_update(command.clone()))
            .await?;

        self.event_sender
            .send(Event::ReservationUpdated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(reservation_id = %updated.id, "Updated reservation");

        Ok(updated)
    }

    async fn try_update(
        &self,
        command: UpdateReservationCommand,
    ) -> Result<reservation::Model, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, reservation::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_reservation(txn, command.reservation_id).await?;
                let old_quantity = existing.quantity;

                let new_product = match existing.product_id {
                    Some(old_pid) if old_pid == command.product_id => {
                        let product = load_product(txn, command.product_id).await?;
                        reconcile_delta(txn, &product, old_quantity, command.quantity).await?;
                        product
                    }
                    Some(old_pid) => {
                        // Product switch: return the full old quantity, then
                        // debit the new product for the full new quantity.
                        let old_product = load_product(txn, old_pid).await?;
                        apply_product_delta(txn, &old_product, old_quantity, 0).await?;

                        let new_product = load_product(txn, command.product_id).await?;
                        ensure_available(&new_product, command.quantity)?;
                        apply_product_delta(txn, &new_product, -command.quantity, 0).await?;
                        new_product
                    }
                    None => {
                        // Orphaned reservation being re-pointed at a product:
                        // nothing to credit, debit the new product in full.
                        let new_product = load_product(txn, command.product_id).await?;
                        ensure_available(&new_product, command.quantity)?;
                        apply_product_delta(txn, &new_product, -command.quantity, 0).await?;
                        new_product
                    }
                };

                let mut active: reservation::ActiveModel = existing.into();
                active.product_id = Set(Some(new_product.id));
                active.product_name = Set(new_product.name.clone());
                active.client_id = Set(command.client_id);
                active.quantity = Set(command.quantity);
                active.size = Set(command.size.clone());
                active.location = Set(command.location.clone());
                active.reserved_for = Set(command.reserved_for);
                active.status = Set(command.status.to_string());

                active.update(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(map_txn_err)
    }

    /// Quantity-only variant of update, for the lightweight endpoint.
    #[instrument(skip(self))]
    pub async fn update_reservation_quantity(
        &self,
        reservation_id: Uuid,
        new_quantity: i32,
    ) -> Result<reservation::Model, ServiceError> {
        if new_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity cannot be negative".to_string(),
            ));
        }

        let updated = self
            .with_cas_retry(|| self.try_update_quantity(reservation_id, new_quantity))
            .await?;

        self.event_sender
            .send(Event::ReservationUpdated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    async fn try_update_quantity(
        &self,
        reservation_id: Uuid,
        new_quantity: i32,
    ) -> Result<reservation::Model, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, reservation::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_reservation(txn, reservation_id).await?;

                let product_id = existing.product_id.ok_or_else(|| {
                    ServiceError::InvalidOperation(format!(
                        "Reservation {} no longer references a product",
                        reservation_id
                    ))
                })?;

                let product = load_product(txn, product_id).await?;
                reconcile_delta(txn, &product, existing.quantity, new_quantity).await?;

                let mut active: reservation::ActiveModel = existing.into();
                active.quantity = Set(new_quantity);
                active.update(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(map_txn_err)
    }

    /// Status-only mutation; no quantity effects.
    #[instrument(skip(self))]
    pub async fn update_reservation_status(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
    ) -> Result<reservation::Model, ServiceError> {
        let db = &*self.db_pool;

        let existing = ReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        let old_status = existing.status.clone();
        let mut active: reservation::ActiveModel = existing.into();
        active.status = Set(status.to_string());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::ReservationStatusChanged {
                reservation_id,
                old_status,
                new_status: updated.status.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(reservation_id = %reservation_id, status = %updated.status, "Updated reservation status");

        Ok(updated)
    }

    /// Deletes a reservation, returning its quantity to the owning product.
    /// Returning stock cannot fail a stock check.
    #[instrument(skip(self))]
    pub async fn delete_reservation(&self, reservation_id: Uuid) -> Result<(), ServiceError> {
        let restored = self
            .with_cas_retry(|| self.try_delete(reservation_id))
            .await?;

        self.event_sender
            .send(Event::ReservationDeleted {
                reservation_id,
                restored_quantity: restored,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(
            reservation_id = %reservation_id,
            restored_quantity = restored,
            "Deleted reservation"
        );

        Ok(())
    }

    async fn try_delete(&self, reservation_id: Uuid) -> Result<i32, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, i32, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_reservation(txn, reservation_id).await?;
                let restored = existing.quantity;

                if let Some(product_id) = existing.product_id {
                    let product = load_product(txn, product_id).await?;
                    apply_product_delta(txn, &product, restored, 0).await?;
                }

                ReservationEntity::delete_by_id(existing.id)
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                Ok(restored)
            })
        })
        .await
        .map_err(map_txn_err)
    }

    /// Marks units of a reservation as damaged: moves `amount` from quantity
    /// to damaged_amount. Damaged units never return to sellable stock.
    #[instrument(skip(self))]
    pub async fn mark_damaged(
        &self,
        reservation_id: Uuid,
        amount: i32,
    ) -> Result<reservation::Model, ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::ValidationError(
                "Damaged amount must be greater than 0".to_string(),
            ));
        }

        let updated = self
            .with_cas_retry(|| self.try_mark_damaged(reservation_id, amount))
            .await?;

        self.event_sender
            .send(Event::DamageRecorded {
                target_id: reservation_id,
                target: DamageTarget::Reservation,
                amount,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(reservation_id = %reservation_id, amount, "Marked reservation units damaged");

        Ok(updated)
    }

    async fn try_mark_damaged(
        &self,
        reservation_id: Uuid,
        amount: i32,
    ) -> Result<reservation::Model, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, reservation::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_reservation(txn, reservation_id).await?;

                if amount > existing.quantity {
                    return Err(ServiceError::AmountExceedsAvailable(format!(
                        "reservation {}: requested {}, available {}",
                        reservation_id, amount, existing.quantity
                    )));
                }

                // No product write serializes this transaction, so the
                // reservation write itself is conditional on the quantity
                // just read. A concurrent writer moving it first surfaces
                // as a conflict and the operation retries.
                let result = ReservationEntity::update_many()
                    .col_expr(
                        reservation::Column::Quantity,
                        Expr::value(existing.quantity - amount),
                    )
                    .col_expr(
                        reservation::Column::DamagedAmount,
                        Expr::value(existing.damaged_amount + amount),
                    )
                    .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(reservation::Column::Id.eq(existing.id))
                    .filter(reservation::Column::Quantity.eq(existing.quantity))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                if result.rows_affected == 0 {
                    return Err(ServiceError::ConcurrentModification(reservation_id));
                }

                load_reservation(txn, reservation_id).await
            })
        })
        .await
        .map_err(map_txn_err)
    }

    /// Gets a reservation by ID.
    #[instrument(skip(self))]
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        let db = &*self.db_pool;

        ReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists reservations with pagination and optional filters.
    #[instrument(skip(self))]
    pub async fn list_reservations(
        &self,
        page: u64,
        limit: u64,
        status_filter: Option<ReservationStatus>,
        product_id_filter: Option<Uuid>,
    ) -> Result<(Vec<reservation::Model>, u64), ServiceError> {
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

        let mut query = ReservationEntity::find();

        if let Some(status) = status_filter {
            query = query.filter(reservation::Column::Status.eq(status.as_str()));
        }
        if let Some(product_id) = product_id_filter {
            query = query.filter(reservation::Column::ProductId.eq(product_id));
        }

        query = query.order_by_desc(reservation::Column::ReservedAt);

        let paginator = query.paginate(db, limit);
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

    /// Runs a CAS-guarded operation, retrying a bounded number of times when
    /// another transaction wins the product-version race.
    async fn with_cas_retry<T, F, Fut>(&self, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Err(ServiceError::ConcurrentModification(id)) if attempt < MAX_CAS_ATTEMPTS => {
                    warn!(entity_id = %id, attempt, "Write conflict, retrying");
                }
                other => return other,
            }
        }
    }
}

async fn load_reservation(
    txn: &DatabaseTransaction,
    reservation_id: Uuid,
) -> Result<reservation::Model, ServiceError> {
    ReservationEntity::find_by_id(reservation_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))
}

/// Same-product quantity delta: debit on increase (with stock check), credit
/// on decrease, no product write when unchanged.
async fn reconcile_delta(
    txn: &DatabaseTransaction,
    product: &crate::entities::product::Model,
    old_quantity: i32,
    new_quantity: i32,
) -> Result<(), ServiceError> {
    let delta = new_quantity - old_quantity;
    if delta > 0 {
        ensure_available(product, delta)?;
        apply_product_delta(txn, product, -delta, 0).await?;
    } else if delta < 0 {
        apply_product_delta(txn, product, -delta, 0).await?;
    }
    Ok(())
}

/// Resolves the command's client reference, creating the client row inside
/// the transaction when identity fields were supplied inline.
async fn resolve_client(
    txn: &DatabaseTransaction,
    client_ref: &ClientRef,
) -> Result<(Option<Uuid>, Option<String>, Option<String>, Option<String>), ServiceError> {
    match client_ref {
        ClientRef::Existing(client_id) => {
            let found = client::Entity::find_by_id(*client_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Client {} not found", client_id))
                })?;
            Ok((Some(found.id), Some(found.name), found.phone, found.address))
        }
        ClientRef::New {
            name,
            phone,
            address,
        } => {
            let active = client::ActiveModel {
                name: Set(name.clone()),
                phone: Set(phone.clone()),
                address: Set(address.clone()),
                ..Default::default()
            };
            let created = active.insert(txn).await.map_err(ServiceError::db_error)?;
            Ok((
                Some(created.id),
                Some(created.name),
                created.phone,
                created.address,
            ))
        }
    }
}

/// Finds a pending reservation with an identical merge key
/// (product, client, size, date).
async fn find_pending_match(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    client_id: Option<Uuid>,
    size: Option<&str>,
    reserved_for: Option<NaiveDate>,
) -> Result<Option<reservation::Model>, ServiceError> {
    let mut query = ReservationEntity::find()
        .filter(reservation::Column::ProductId.eq(product_id))
        .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()));

    query = match client_id {
        Some(id) => query.filter(reservation::Column::ClientId.eq(id)),
        None => query.filter(reservation::Column::ClientId.is_null()),
    };
    query = match size {
        Some(s) => query.filter(reservation::Column::Size.eq(s)),
        None => query.filter(reservation::Column::Size.is_null()),
    };
    query = match reserved_for {
        Some(d) => query.filter(reservation::Column::ReservedFor.eq(d)),
        None => query.filter(reservation::Column::ReservedFor.is_null()),
    };

    query.one(txn).await.map_err(ServiceError::db_error)
}

fn map_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_persisted_values() {
        assert_eq!(ReservationStatus::Pending.as_str(), "pending");
        assert_eq!(
            ReservationStatus::parse("confirmed"),
            Some(ReservationStatus::Confirmed)
        );
    }

    #[test]
    fn commands_serialize_for_audit_logging() {
        let cmd = CreateReservationCommand {
            product_id: Uuid::new_v4(),
            client: ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            quantity: 4,
            size: Some("M".to_string()),
            location: None,
            reserved_for: None,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("product_id"));
        assert!(json.contains("Asha"));
    }
}
