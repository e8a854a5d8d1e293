//! Sale finalization service.
//!
//! Turns a direct product sale or a reservation conversion into a sale row,
//! debiting the correct source and computing monetary totals in one
//! transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::reservation::{self, Entity as ReservationEntity};
use crate::entities::sale::{self, DiscountType, Entity as SaleEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::stock::{apply_product_delta, ensure_available, load_product};
use crate::services::MAX_CAS_ATTEMPTS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSaleCommand {
    pub product_id: Uuid,
    /// Present when the sale converts (part of) a reservation.
    pub reservation_id: Option<Uuid>,
    pub quantity: i32,
    pub price_per_unit: Option<Decimal>,
    pub total_amount: Decimal,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub shipping_charges: Option<Decimal>,
    pub order_date: Option<NaiveDate>,
    pub dispatch_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub platform: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

/// Computes the discount portion of a sale.
///
/// `amount` discounts pass the value through; `percentage` discounts take
/// value percent of the total; no discount type means zero.
pub fn compute_discount(
    total_amount: Decimal,
    discount_type: Option<DiscountType>,
    discount_value: Option<Decimal>,
) -> Decimal {
    let value = discount_value.unwrap_or(Decimal::ZERO);
    match discount_type {
        Some(DiscountType::Amount) => value,
        Some(DiscountType::Percentage) => total_amount * value / Decimal::from(100),
        None => Decimal::ZERO,
    }
}

/// Service for recording and deleting sales.
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SaleService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a sale, debiting the reservation (when given) and always the
    /// product. One transaction; any failure rolls back everything.
    #[instrument(skip(self, command))]
    pub async fn record_sale(&self, command: RecordSaleCommand) -> Result<sale::Model, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Sale quantity must be greater than 0".to_string(),
            ));
        }
        if command.total_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Total amount cannot be negative".to_string(),
            ));
        }

        let mut attempt = 0u32;
        let recorded = loop {
            attempt += 1;
            match self.try_record(command.clone()).await {
                Err(ServiceError::ConcurrentModification(id)) if attempt < MAX_CAS_ATTEMPTS => {
                    warn!(product_id = %id, attempt, "Product version conflict, retrying sale");
                }
                other => break other?,
            }
        };

        self.event_sender
            .send(Event::SaleRecorded {
                sale_id: recorded.id,
                product_id: recorded.product_id,
                reservation_id: recorded.reservation_id,
                quantity: recorded.quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(
            sale_id = %recorded.id,
            product_id = %recorded.product_id,
            quantity = recorded.quantity,
            final_amount = %recorded.final_amount,
            "Recorded sale"
        );

        Ok(recorded)
    }

    async fn try_record(&self, command: RecordSaleCommand) -> Result<sale::Model, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, sale::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let product = load_product(txn, command.product_id).await?;

                let reservation = match command.reservation_id {
                    Some(reservation_id) => {
                        let found = ReservationEntity::find_by_id(reservation_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Reservation {} not found",
                                    reservation_id
                                ))
                            })?;
                        // The hold must be against the product being sold,
                        // otherwise the sale would drain one product's stock
                        // against another product's hold.
                        if found.product_id != Some(command.product_id) {
                            return Err(ServiceError::InvalidOperation(format!(
                                "Reservation {} is not held against product {}",
                                reservation_id, command.product_id
                            )));
                        }
                        // Selling from a reservation checks the reservation's
                        // quantity; the product was already debited when the
                        // hold was placed.
                        if found.quantity < command.quantity {
                            return Err(ServiceError::InsufficientStock(format!(
                                "reservation {}: requested {}, available {} (short {})",
                                reservation_id,
                                command.quantity,
                                found.quantity,
                                command.quantity - found.quantity
                            )));
                        }
                        Some(found)
                    }
                    None => {
                        ensure_available(&product, command.quantity)?;
                        None
                    }
                };

                let shipping = command.shipping_charges.unwrap_or(Decimal::ZERO);
                let discount_amount = compute_discount(
                    command.total_amount,
                    command.discount_type,
                    command.discount_value,
                );
                let final_amount = command.total_amount - discount_amount + shipping;

                let active = sale::ActiveModel {
                    product_id: Set(product.id),
                    reservation_id: Set(command.reservation_id),
                    customer_name: Set(command.customer_name.clone()),
                    customer_phone: Set(command.customer_phone.clone()),
                    quantity: Set(command.quantity),
                    price_per_unit: Set(command.price_per_unit),
                    total_amount: Set(command.total_amount),
                    discount_type: Set(command.discount_type.map(|t| t.to_string())),
                    discount_value: Set(command.discount_value),
                    discount_amount: Set(discount_amount),
                    shipping_charges: Set(shipping),
                    final_amount: Set(final_amount),
                    order_date: Set(command.order_date),
                    dispatch_date: Set(command.dispatch_date),
                    delivered_date: Set(command.delivered_date),
                    payment_method: Set(command.payment_method.clone()),
                    platform: Set(command.platform.clone()),
                    ..Default::default()
                };
                let inserted = active.insert(txn).await.map_err(ServiceError::db_error)?;

                // The product is always debited at the point of sale, even for
                // reservation-sourced sales; floored at zero since those skip
                // the product stock check.
                let product_debit = if reservation.is_some() {
                    command.quantity.min(product.quantity)
                } else {
                    command.quantity
                };
                apply_product_delta(txn, &product, -product_debit, 0).await?;

                if let Some(found) = reservation {
                    // Defensive floor; the check above already rules out a
                    // negative result.
                    let remaining = (found.quantity - command.quantity).max(0);
                    let mut active: reservation::ActiveModel = found.into();
                    active.quantity = Set(remaining);
                    active.update(txn).await.map_err(ServiceError::db_error)?;
                }

                Ok(inserted)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Deletes a sale and restores the product's quantity. The originating
    /// reservation's debit is considered permanently consumed.
    #[instrument(skip(self))]
    pub async fn delete_sale(&self, sale_id: Uuid) -> Result<(), ServiceError> {
        let mut attempt = 0u32;
        let restored = loop {
            attempt += 1;
            match self.try_delete(sale_id).await {
                Err(ServiceError::ConcurrentModification(id)) if attempt < MAX_CAS_ATTEMPTS => {
                    warn!(product_id = %id, attempt, "Product version conflict, retrying sale deletion");
                }
                other => break other?,
            }
        };

        self.event_sender
            .send(Event::SaleDeleted {
                sale_id,
                restored_quantity: restored,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(sale_id = %sale_id, restored_quantity = restored, "Deleted sale");

        Ok(())
    }

    async fn try_delete(&self, sale_id: Uuid) -> Result<i32, ServiceError> {
        let db = &*self.db_pool;

        db.transaction::<_, i32, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = SaleEntity::find_by_id(sale_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Sale {} not found", sale_id))
                    })?;

                let product = load_product(txn, existing.product_id).await?;
                apply_product_delta(txn, &product, existing.quantity, 0).await?;

                SaleEntity::delete_by_id(existing.id)
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                Ok(existing.quantity)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Gets a sale by ID.
    #[instrument(skip(self))]
    pub async fn get_sale(&self, sale_id: Uuid) -> Result<Option<sale::Model>, ServiceError> {
        let db = &*self.db_pool;

        SaleEntity::find_by_id(sale_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists sales with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        limit: u64,
        product_id_filter: Option<Uuid>,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
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

        let mut query = SaleEntity::find();
        if let Some(product_id) = product_id_filter {
            query = query.filter(sale::Column::ProductId.eq(product_id));
        }
        query = query.order_by_desc(sale::Column::CreatedAt);

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(200), Some(DiscountType::Percentage), Some(dec!(10)), dec!(20) ; "ten percent of two hundred")]
    #[test_case(dec!(200), Some(DiscountType::Amount), Some(dec!(50)), dec!(50) ; "flat fifty")]
    #[test_case(dec!(200), None, Some(dec!(50)), dec!(0) ; "no discount type means no discount")]
    #[test_case(dec!(200), Some(DiscountType::Percentage), None, dec!(0) ; "missing value defaults to zero")]
    #[test_case(dec!(150), Some(DiscountType::Percentage), Some(dec!(100)), dec!(150) ; "hundred percent wipes the total")]
    fn discount_arithmetic(
        total: Decimal,
        discount_type: Option<DiscountType>,
        value: Option<Decimal>,
        expected: Decimal,
    ) {
        assert_eq!(compute_discount(total, discount_type, value), expected);
    }

    #[test]
    fn final_amount_combines_discount_and_shipping() {
        // percentage: 10% of 200 with no shipping
        let discount = compute_discount(dec!(200), Some(DiscountType::Percentage), Some(dec!(10)));
        assert_eq!(dec!(200) - discount + dec!(0), dec!(180));

        // flat: 50 off 200 plus 20 shipping
        let discount = compute_discount(dec!(200), Some(DiscountType::Amount), Some(dec!(50)));
        assert_eq!(dec!(200) - discount + dec!(20), dec!(170));
    }

    #[test]
    fn discount_type_round_trips_through_strings() {
        assert_eq!(DiscountType::Amount.as_str(), "amount");
        assert_eq!(
            DiscountType::parse("percentage"),
            Some(DiscountType::Percentage)
        );
        assert_eq!(DiscountType::parse("bogus"), None);
    }

    proptest::proptest! {
        #[test]
        fn percentage_discount_never_exceeds_total(
            total_cents in 0i64..10_000_000,
            percent in 0u8..=100,
        ) {
            let total = Decimal::new(total_cents, 2);
            let discount = compute_discount(
                total,
                Some(DiscountType::Percentage),
                Some(Decimal::from(percent)),
            );
            proptest::prop_assert!(discount >= Decimal::ZERO);
            proptest::prop_assert!(discount <= total);
        }

        #[test]
        fn reservation_remainder_never_goes_negative(
            reserved in 0i32..1000,
            sold in 0i32..2000,
        ) {
            let remaining = (reserved - sold).max(0);
            proptest::prop_assert!(remaining >= 0);
            proptest::prop_assert!(remaining <= reserved.max(0));
        }
    }
}
