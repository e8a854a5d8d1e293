//! Product service: intake, damage marking, and the documented delete
//! cascade (referencing reservations keep their product_name snapshot and
//! lose only the foreign key).

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::product::{self, Entity as ProductEntity};
use crate::entities::reservation;
use crate::errors::ServiceError;
use crate::events::{DamageTarget, Event, EventSender};
use crate::services::stock::{apply_product_delta, load_product};
use crate::services::MAX_CAS_ATTEMPTS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductCommand {
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub quantity: i32,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProductCommand {
    pub product_id: Uuid,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub price: Option<Decimal>,
}

/// Service for managing products.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a product from the intake form.
    #[instrument(skip(self, command))]
    pub async fn create_product(
        &self,
        command: CreateProductCommand,
    ) -> Result<product::Model, ServiceError> {
        if command.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Initial quantity cannot be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let active = product::ActiveModel {
            name: Set(command.name.clone()),
            size: Set(command.size.clone()),
            color: Set(command.color.clone()),
            location: Set(command.location.clone()),
            quantity: Set(command.quantity),
            price: Set(command.price),
            ..Default::default()
        };
        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::ProductCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(product_id = %created.id, name = %created.name, "Created product");

        Ok(created)
    }

    /// Updates descriptive fields. Quantity is owned by the reconciliation
    /// operations and is not writable here.
    #[instrument(skip(self, command))]
    pub async fn update_product(
        &self,
        command: UpdateProductCommand,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db_pool;

        let existing = ProductEntity::find_by_id(command.product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", command.product_id))
            })?;

        let mut active: product::ActiveModel = existing.into();
        active.name = Set(command.name.clone());
        active.size = Set(command.size.clone());
        active.color = Set(command.color.clone());
        active.location = Set(command.location.clone());
        active.price = Set(command.price);
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::ProductUpdated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Marks units of a product as damaged: moves `amount` from quantity to
    /// damaged_amount in one compare-and-swap write.
    #[instrument(skip(self))]
    pub async fn mark_damaged(
        &self,
        product_id: Uuid,
        amount: i32,
    ) -> Result<product::Model, ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::ValidationError(
                "Damaged amount must be greater than 0".to_string(),
            ));
        }

        let mut attempt = 0u32;
        let updated = loop {
            attempt += 1;
            match self.try_mark_damaged(product_id, amount).await {
                Err(ServiceError::ConcurrentModification(id)) if attempt < MAX_CAS_ATTEMPTS => {
                    warn!(product_id = %id, attempt, "Product version conflict, retrying damage mark");
                }
                other => break other?,
            }
        };

        self.event_sender
            .send(Event::DamageRecorded {
                target_id: product_id,
                target: DamageTarget::Product,
                amount,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(product_id = %product_id, amount, "Marked product units damaged");

        Ok(updated)
    }

    async fn try_mark_damaged(
        &self,
        product_id: Uuid,
        amount: i32,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, product::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_product(txn, product_id).await?;

                if amount > existing.quantity {
                    return Err(ServiceError::AmountExceedsAvailable(format!(
                        "product {}: requested {}, available {}",
                        existing.name, amount, existing.quantity
                    )));
                }

                apply_product_delta(txn, &existing, -amount, amount).await?;
                load_product(txn, product_id).await
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Deletes a product. Reservations referencing it keep their quantity and
    /// product_name snapshot but lose the foreign key; no quantity repair is
    /// attempted beyond the nulling.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = load_product(txn, product_id).await?;

                reservation::Entity::update_many()
                    .col_expr(
                        reservation::Column::ProductId,
                        Expr::value(None::<Uuid>),
                    )
                    .filter(reservation::Column::ProductId.eq(existing.id))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                ProductEntity::delete_by_id(existing.id)
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })?;

        self.event_sender
            .send(Event::ProductDeleted(product_id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(product_id = %product_id, "Deleted product");

        Ok(())
    }

    /// Gets a product by ID.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        let db = &*self.db_pool;

        ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists products with pagination.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
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

        let paginator = ProductEntity::find()
            .order_by_asc(product::Column::Name)
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
