//! Stock movement helpers shared by the reservation and sale services.
//!
//! Every product quantity write goes through [`apply_product_delta`], a
//! compare-and-swap against the product's `version` column. A lost CAS inside
//! a transaction surfaces as `ConcurrentModification`, the transaction rolls
//! back, and the calling service retries the whole operation.

use chrono::Utc;
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::product;
use crate::errors::ServiceError;

/// Loads a product row or fails with `NotFound`.
pub(crate) async fn load_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Checks that a product can cover `requested` units, reporting the shortfall
/// in the error message.
pub(crate) fn ensure_available(
    product: &product::Model,
    requested: i32,
) -> Result<(), ServiceError> {
    if product.quantity < requested {
        return Err(ServiceError::InsufficientStock(format!(
            "product {}: requested {}, available {} (short {})",
            product.name,
            requested,
            product.quantity,
            requested - product.quantity
        )));
    }
    Ok(())
}

/// Applies a quantity/damaged delta to a product via compare-and-swap on its
/// version column. Must run inside the caller's transaction.
///
/// Fails with `ConcurrentModification` when another transaction won the race,
/// and with `InsufficientStock` if the delta would drive the quantity negative
/// (callers check availability first; this is the final floor).
pub(crate) async fn apply_product_delta<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    quantity_delta: i32,
    damaged_delta: i32,
) -> Result<(), ServiceError> {
    let new_quantity = product.quantity + quantity_delta;
    let new_damaged = product.damaged_amount + damaged_delta;

    if new_quantity < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "product {}: requested {}, available {}",
            product.name, -quantity_delta, product.quantity
        )));
    }
    if new_damaged < 0 {
        return Err(ServiceError::InvalidOperation(format!(
            "product {}: damaged amount cannot go negative",
            product.name
        )));
    }

    let result = product::Entity::update_many()
        .col_expr(product::Column::Quantity, Expr::value(new_quantity))
        .col_expr(product::Column::DamagedAmount, Expr::value(new_damaged))
        .col_expr(product::Column::Version, Expr::value(product.version + 1))
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::Version.eq(product.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        counter!("stockroom_stock.cas_conflicts", 1);
        return Err(ServiceError::ConcurrentModification(product.id));
    }

    counter!("stockroom_stock.product_writes", 1);
    Ok(())
}
