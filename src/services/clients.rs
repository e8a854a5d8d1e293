//! Client service: standalone client CRUD. Ad-hoc creation during
//! reservation creation lives in the reservation transaction itself.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::client::{self, Entity as ClientEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientCommand {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Service for managing clients.
#[derive(Clone)]
pub struct ClientService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ClientService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a client. Email uniqueness is enforced by index; a duplicate
    /// surfaces as a database error.
    #[instrument(skip(self, command))]
    pub async fn create_client(
        &self,
        command: CreateClientCommand,
    ) -> Result<client::Model, ServiceError> {
        let db = &*self.db_pool;

        let active = client::ActiveModel {
            name: Set(command.name.clone()),
            email: Set(command.email.clone()),
            phone: Set(command.phone.clone()),
            address: Set(command.address.clone()),
            ..Default::default()
        };
        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send(Event::ClientCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        info!(client_id = %created.id, "Created client");

        Ok(created)
    }

    /// Gets a client by ID.
    #[instrument(skip(self))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<client::Model>, ServiceError> {
        let db = &*self.db_pool;

        ClientEntity::find_by_id(client_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Finds a client by email.
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<client::Model>, ServiceError> {
        let db = &*self.db_pool;

        ClientEntity::find()
            .filter(client::Column::Email.eq(email))
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists clients with pagination, alphabetical.
    #[instrument(skip(self))]
    pub async fn list_clients(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<client::Model>, u64), ServiceError> {
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

        let paginator = ClientEntity::find()
            .order_by_asc(client::Column::Name)
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
