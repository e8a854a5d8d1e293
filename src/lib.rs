//! Stockroom API Library
//!
//! Inventory, reservation, sale, and invoicing management for a small
//! retail stockroom. The core of the crate is the quantity reconciliation
//! logic in [`services`]: every stock movement between a product and its
//! reservations or sales happens inside a transaction that compare-and-swaps
//! the product row's version column.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use services::{
    ClientService, InvoiceService, ProductService, ReservationService, ReturnService, SaleService,
};

/// Bundle of all domain services over a shared pool and event channel.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductService,
    pub clients: ClientService,
    pub reservations: ReservationService,
    pub sales: SaleService,
    pub invoices: InvoiceService,
    pub returns: ReturnService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: events::EventSender) -> Self {
        Self {
            products: ProductService::new(db.clone(), event_sender.clone()),
            clients: ClientService::new(db.clone(), event_sender.clone()),
            reservations: ReservationService::new(db.clone(), event_sender.clone()),
            sales: SaleService::new(db.clone(), event_sender.clone()),
            invoices: InvoiceService::new(db.clone(), event_sender.clone()),
            returns: ReturnService::new(db, event_sender),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
