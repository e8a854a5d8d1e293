//! Return service.
//!
//! Returns are record-keeping only: creating or deleting one never restocks
//! the product. Putting returned units back on the shelf would be a separate
//! explicit intake.

use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::product;
use crate::entities::return_record::{self, Entity as ReturnEntity, ReturnStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReturnCommand {
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub damaged: bool,
    pub refund_money: bool,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub reason: Option<String>,
    pub image_url: Option<String>,
}

/// Service for managing returns.
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a return. The product name is snapshotted at creation so the
    /// record survives product deletion.
    #[instrument(skip(self, command))]
    pub async fn create_return(
        &self,
        command: CreateReturnCommand,
    ) -> Result<return_record::Model, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Return quantity must be greater than 0".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let product_name = match command.product_id {
            Some(product_id) => product::Entity::find_by_id(product_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .map(|p| p.name)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", product_id))
                })?,
            None => "unknown product".to_string(),
        };

        let active = return_record::ActiveModel {
            product_id: Set(command.product_id),
            product_name: Set(product_name),
            quantity: Set(command.quantity),
            damaged: Set(command.damaged),
            refund_money: Set(command.refund_money),
            client_name: Set(command.client_name.clone()),
            client_phone: Set(command.client_phone.clone()),
            reason: Set(command.reason.clone()),
            image_url: Set(command.image_url.clone()),
            status: Set(ReturnStatus::Pending.to_string()),
            ..Default::default()
        };
        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::ReturnCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(return_id = %created.id, quantity = created.quantity, "Recorded return");

        Ok(created)
    }

    /// Status-only mutation.
    #[instrument(skip(self))]
    pub async fn update_return_status(
        &self,
        return_id: Uuid,
        status: ReturnStatus,
    ) -> Result<return_record::Model, ServiceError> {
        let db = &*self.db_pool;

        let existing = ReturnEntity::find_by_id(return_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_id)))?;

        let mut active: return_record::ActiveModel = existing.into();
        active.status = Set(status.to_string());
        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Deletes a return record. No stock effects.
    #[instrument(skip(self))]
    pub async fn delete_return(&self, return_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = ReturnEntity::delete_by_id(return_id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Return {} not found",
                return_id
            )));
        }

        self.event_sender
            .send(Event::ReturnDeleted(return_id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    /// Gets a return by ID.
    #[instrument(skip(self))]
    pub async fn get_return(
        &self,
        return_id: Uuid,
    ) -> Result<Option<return_record::Model>, ServiceError> {
        let db = &*self.db_pool;

        ReturnEntity::find_by_id(return_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists returns with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_returns(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<return_record::Model>, u64), ServiceError> {
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

        let paginator = ReturnEntity::find()
            .order_by_desc(return_record::Column::CreatedAt)
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
