use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Discount applied to a sale, either a flat amount or a percentage of the
/// total.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Amount,
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::from_str(s).ok()
    }
}

/// Sale entity. Immutable once created except through explicit delete;
/// deletion restores the product's quantity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub product_id: Uuid,

    /// Set when the sale was converted from a reservation.
    pub reservation_id: Option<Uuid>,

    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,

    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,

    pub price_per_unit: Option<Decimal>,
    pub total_amount: Decimal,

    /// "amount" or "percentage"; null means no discount.
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub discount_amount: Decimal,
    pub shipping_charges: Decimal,

    /// total_amount - discount_amount + shipping_charges
    pub final_amount: Decimal,

    pub order_date: Option<NaiveDate>,
    pub dispatch_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,

    pub payment_method: Option<String>,
    pub platform: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.shipping_charges {
                active_model.shipping_charges = Set(Decimal::ZERO);
            }
            if let ActiveValue::NotSet = active_model.discount_amount {
                active_model.discount_amount = Set(Decimal::ZERO);
            }
            active_model.created_at = Set(now);
        }

        active_model.updated_at = Set(Some(now));

        let model: Model = active_model.clone().try_into().map_err(|_| {
            DbErr::Custom("Failed to convert ActiveModel to Model for validation".to_string())
        })?;

        if let Err(err) = model.validate() {
            return Err(DbErr::Custom(format!("Validation error: {}", err)));
        }

        Ok(active_model)
    }
}
