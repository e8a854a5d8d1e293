//! Service layer: one service per aggregate, each holding the shared
//! connection pool and an event sender.
//!
//! Quantity transitions between products, reservations, and sales all go
//! through [`stock`] compare-and-swap helpers inside transactions, so that
//! concurrent reconciliations against the same product serialize on its
//! version column instead of silently losing writes.

pub mod clients;
pub mod invoicing;
pub mod products;
pub mod reservations;
pub mod returns;
pub mod sales;
pub(crate) mod stock;

pub use clients::ClientService;
pub use invoicing::InvoiceService;
pub use products::ProductService;
pub use reservations::ReservationService;
pub use returns::ReturnService;
pub use sales::SaleService;

/// Upper bound on compare-and-swap retries when a product's version column
/// moved underneath a transaction.
pub(crate) const MAX_CAS_ATTEMPTS: u32 = 3;
