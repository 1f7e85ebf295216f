use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable order header. Created at checkout completion, never deleted;
/// cancellation is a status change.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// External-facing order token, e.g. "ORD-004518272930".
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_payment::Entity")]
    Payments,
    #[sea_orm(has_many = "super::order_shipping::Entity")]
    Shippings,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::order_shipping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shippings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order fulfillment status. A plain field, not a transition-validated state
/// machine; only cancellation checks the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "decorated")]
    Decorated,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "build")]
    Build,
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refund")]
    Refund,
}

impl OrderStatus {
    /// Statuses past which an order can no longer be cancelled.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled
                | OrderStatus::Completed
                | OrderStatus::Received
                | OrderStatus::Refund
        )
    }
}
