use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Status for reservations.
///
/// While a reservation is `pending` or `confirmed`, its quantity has already
/// been deducted from the owning product (the deduction happens at creation,
/// not at confirmation).
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
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::from_str(s).ok()
    }
}

/// Reservation entity: a hold of N units of a product for a specific client.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Nullable: the product may be deleted independently of the reservation.
    pub product_id: Option<Uuid>,

    /// Denormalized snapshot of the product name so display survives product
    /// deletion.
    pub product_name: String,

    /// Either a client row reference or the inlined identity fields below.
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_address: Option<String>,

    /// Units held out of the product's quantity.
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,

    #[validate(range(min = 0, message = "Damaged amount cannot be negative"))]
    pub damaged_amount: i32,

    pub size: Option<String>,
    pub location: Option<String>,

    /// The date the reservation is held for (part of the merge key).
    pub reserved_for: Option<NaiveDate>,

    pub status: String,

    /// When the hold was placed or last merged into.
    pub reserved_at: DateTime<Utc>,

    pub discount_amount: Option<Decimal>,
    pub final_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Option<ReservationStatus> {
        ReservationStatus::parse(&self.status)
    }

    /// Active reservations are the ones whose quantity is currently deducted
    /// from the owning product.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status(),
            Some(ReservationStatus::Pending) | Some(ReservationStatus::Confirmed)
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
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
            if let ActiveValue::NotSet = active_model.damaged_amount {
                active_model.damaged_amount = Set(0);
            }
            if let ActiveValue::NotSet = active_model.status {
                active_model.status = Set(ReservationStatus::Pending.to_string());
            }
            // Nullable money fields are not supplied by the reconciliation
            // paths; they must still be concrete for the validation conversion
            // below.
            if let ActiveValue::NotSet = active_model.discount_amount {
                active_model.discount_amount = Set(None);
            }
            if let ActiveValue::NotSet = active_model.final_amount {
                active_model.final_amount = Set(None);
            }
            if let ActiveValue::NotSet = active_model.paid_amount {
                active_model.paid_amount = Set(None);
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
