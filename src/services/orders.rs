//! Durable order operations: committing a staged order into relational
//! records, reads, status updates and cancellation.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    entities::{order, order_item, order_payment, order_shipping},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{PaymentMethod, StagedOrder},
    services::pricing::round2,
};

/// Full read model of a finalized order.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub payment: Option<order_payment::Model>,
    pub shipping: Option<order_shipping::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Generates the external-facing order token. Random within a 10^12 space;
    /// collisions are treated as negligible and not deduplicated.
    fn new_order_number() -> String {
        let token: u64 = rand::thread_rng().gen_range(0..1_000_000_000_000);
        format!("ORD-{:012}", token)
    }

    /// Commits a staged order into durable records: header, line items, one
    /// payment record and one shipping record, inside a single transaction.
    ///
    /// The caller clears the basket and deletes the staged document only after
    /// this returns; a failed commit leaves both available for retry.
    #[instrument(skip(self, staged), fields(user_id = %staged.user_id))]
    pub async fn finalize_staged(
        &self,
        staged: &StagedOrder,
        method: PaymentMethod,
    ) -> Result<order::Model, ServiceError> {
        let shipping = staged.shipping_data.as_ref().ok_or_else(|| {
            ServiceError::InvalidOperation(
                "Shipping must be selected before completing checkout".to_string(),
            )
        })?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = Self::new_order_number();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to start order transaction");
            ServiceError::DatabaseError(e)
        })?;

        let header = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_id: Set(staged.user_id),
            status: Set(order::OrderStatus::Pending),
            total_amount: Set(staged.price_details.total_cost),
            currency: Set(staged.price_details.currency.clone()),
            created_at: Set(now),
            completed_at: Set(None),
            updated_at: Set(Some(now)),
        };
        let header = header.insert(&txn).await?;

        for item in &staged.items {
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                sku: Set(item.sku.clone()),
                price: Set(round2(item.line_discounted_total())),
                quantity: Set(item.quantity),
                created_at: Set(now),
            };
            line.insert(&txn).await?;
        }

        let (payment_state, paid_at) = if method.is_card() {
            (order_payment::PaymentState::Paid, Some(now))
        } else {
            (order_payment::PaymentState::NotPaid, None)
        };
        let payment = order_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            method: Set(method.as_str().to_string()),
            status: Set(payment_state),
            paid_at: Set(paid_at),
            created_at: Set(now),
        };
        payment.insert(&txn).await?;

        let shipping_row = order_shipping::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            destination_address: Set(shipping.destination_address.clone()),
            warehouse_address: Set(shipping.warehouse_address.clone()),
            postal_code: Set(shipping.postal_code.clone()),
            delivery_tier: Set(shipping.delivery_tier.to_string()),
            cost: Set(shipping.cost),
            estimated_delivery: Set(shipping.estimated_delivery),
            created_at: Set(now),
        };
        shipping_row.insert(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_number, "order committed");
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id,
                order_number,
            })
            .await;

        Ok(header)
    }

    /// Loads an order with its line items, payment and shipping records.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let header = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        let payment = order_payment::Entity::find()
            .filter(order_payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        let shipping = order_shipping::Entity::find()
            .filter(order_shipping::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;

        Ok(OrderDetails {
            order: header,
            items,
            payment,
            shipping,
        })
    }

    /// Writes a new status. Statuses are plain fields; any authorized write is
    /// accepted here.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: order::OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let existing = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = existing.status;
        let mut active: order::ActiveModel = existing.into();
        active.status = Set(status);
        if status == order::OrderStatus::Completed {
            active.completed_at = Set(Some(Utc::now()));
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status),
                new_status: format!("{:?}", status),
            })
            .await;

        Ok(updated)
    }

    /// Cancels an order unless it has already closed out.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let existing = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if existing.status.is_closed() {
            return Err(ServiceError::Conflict(format!(
                "Order {} can no longer be cancelled",
                order_id
            )));
        }

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(order::OrderStatus::Cancelled);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(order_id = %order_id, "order cancelled");
        self.event_sender
            .send_or_log(Event::OrderCancelled { order_id })
            .await;

        Ok(updated)
    }
}
