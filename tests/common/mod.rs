use std::sync::Arc;

use stockroom_api::config::AppConfig;
use stockroom_api::entities::product;
use stockroom_api::events::EventSender;
use stockroom_api::{db, AppState};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Harness wrapping an application state over an in-memory SQLite database.
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database. Events are drained by a background task so service
/// calls never block on a full channel.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (tx, mut rx) = mpsc::channel(64);
        let event_task = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(tx));

        Self {
            state,
            _event_task: event_task,
        }
    }

    /// Inserts a product with the given starting quantity.
    pub async fn seed_product(&self, name: &str, quantity: i32) -> product::Model {
        self.state
            .services
            .products
            .create_product(stockroom_api::services::products::CreateProductCommand {
                name: name.to_string(),
                size: None,
                color: None,
                location: None,
                quantity,
                price: None,
            })
            .await
            .expect("failed to seed product")
    }

    /// Reloads a product row.
    pub async fn product(&self, product_id: Uuid) -> product::Model {
        self.state
            .services
            .products
            .get_product(product_id)
            .await
            .expect("failed to load product")
            .expect("product missing")
    }
}
