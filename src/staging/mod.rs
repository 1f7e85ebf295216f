//! Staged-order store: a TTL-keyed ephemeral repository holding the
//! in-progress checkout document, one per user.
//!
//! The store has no partial-update capability: every write replaces the whole
//! serialized document and refreshes its TTL. The Redis backend closes the
//! concurrent-initiate race with a conditional `SET NX EX` create; subsequent
//! mutations are plain replaces, so two overlapping mutations for the same
//! user can still race (last write wins).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::StagedOrder;

fn staging_key(user_id: Uuid) -> String {
    format!("checkout:order:{}", user_id)
}

#[async_trait]
pub trait StagedOrderStore: Send + Sync {
    async fn exists(&self, user_id: Uuid) -> Result<bool, ServiceError>;

    async fn get(&self, user_id: Uuid) -> Result<Option<StagedOrder>, ServiceError>;

    /// Conditionally creates the document. Returns `false` when one already
    /// exists for the user, leaving the existing document untouched.
    async fn create(&self, order: &StagedOrder) -> Result<bool, ServiceError>;

    /// Replaces the whole document and refreshes its TTL.
    async fn put(&self, order: &StagedOrder) -> Result<(), ServiceError>;

    /// Deletes the document. Returns `false` when none existed.
    async fn delete(&self, user_id: Uuid) -> Result<bool, ServiceError>;
}

/// Redis-backed staged-order store.
#[derive(Clone)]
pub struct RedisStagedOrderStore {
    manager: redis::aio::ConnectionManager,
    ttl: Duration,
    op_timeout: Duration,
}

impl RedisStagedOrderStore {
    pub fn new(
        manager: redis::aio::ConnectionManager,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            ttl,
            op_timeout,
        }
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, ServiceError>
    where
        F: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ServiceError::StagingError(format!("{}: {}", op, err))),
            Err(_) => Err(ServiceError::StagingError(format!("{}: timed out", op))),
        }
    }
}

#[async_trait]
impl StagedOrderStore for RedisStagedOrderStore {
    async fn exists(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let key = staging_key(user_id);
        let mut conn = self.manager.clone();
        self.bounded("EXISTS", async move {
            redis::cmd("EXISTS").arg(&key).query_async(&mut conn).await
        })
        .await
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<StagedOrder>, ServiceError> {
        let key = staging_key(user_id);
        let mut conn = self.manager.clone();
        let raw: Option<String> = self
            .bounded("GET", async move {
                redis::cmd("GET").arg(&key).query_async(&mut conn).await
            })
            .await?;

        raw.map(|body| serde_json::from_str(&body).map_err(ServiceError::from))
            .transpose()
    }

    async fn create(&self, order: &StagedOrder) -> Result<bool, ServiceError> {
        let key = staging_key(order.user_id);
        let body = serde_json::to_string(order)?;
        let ttl_secs = self.ttl.as_secs();
        let mut conn = self.manager.clone();

        // SET NX EX: atomic exists-check + create, closing the double-initiate race.
        let reply: Option<String> = self
            .bounded("SET NX", async move {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(&body)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        Ok(reply.is_some())
    }

    async fn put(&self, order: &StagedOrder) -> Result<(), ServiceError> {
        let key = staging_key(order.user_id);
        let body = serde_json::to_string(order)?;
        let ttl_secs = self.ttl.as_secs();
        let mut conn = self.manager.clone();

        self.bounded("SET EX", async move {
            redis::cmd("SET")
                .arg(&key)
                .arg(&body)
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let key = staging_key(user_id);
        let mut conn = self.manager.clone();
        let removed: i64 = self
            .bounded("DEL", async move {
                redis::cmd("DEL").arg(&key).query_async(&mut conn).await
            })
            .await?;
        Ok(removed > 0)
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    body: String,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-memory staged-order store used by tests and Redis-less deployments.
#[derive(Debug, Clone)]
pub struct InMemoryStagedOrderStore {
    store: Arc<RwLock<HashMap<String, StoredEntry>>>,
    ttl: Duration,
}

impl InMemoryStagedOrderStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn entry(&self, order: &StagedOrder) -> Result<StoredEntry, ServiceError> {
        Ok(StoredEntry {
            body: serde_json::to_string(order)?,
            expires_at: Instant::now() + self.ttl,
        })
    }
}

#[async_trait]
impl StagedOrderStore for InMemoryStagedOrderStore {
    async fn exists(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let store = self.store.read().unwrap();
        Ok(store
            .get(&staging_key(user_id))
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<StagedOrder>, ServiceError> {
        let key = staging_key(user_id);
        let body = {
            let store = self.store.read().unwrap();
            match store.get(&key) {
                Some(entry) if !entry.is_expired() => Some(entry.body.clone()),
                _ => None,
            }
        };

        body.map(|body| serde_json::from_str(&body).map_err(ServiceError::from))
            .transpose()
    }

    async fn create(&self, order: &StagedOrder) -> Result<bool, ServiceError> {
        let entry = self.entry(order)?;
        let mut store = self.store.write().unwrap();
        let key = staging_key(order.user_id);
        if store.get(&key).is_some_and(|existing| !existing.is_expired()) {
            return Ok(false);
        }
        store.insert(key, entry);
        Ok(true)
    }

    async fn put(&self, order: &StagedOrder) -> Result<(), ServiceError> {
        let entry = self.entry(order)?;
        let mut store = self.store.write().unwrap();
        store.insert(staging_key(order.user_id), entry);
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let mut store = self.store.write().unwrap();
        let key = staging_key(user_id);
        let existed = store
            .remove(&key)
            .is_some_and(|entry| !entry.is_expired());
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceDetails, UserData};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_order(user_id: Uuid) -> StagedOrder {
        StagedOrder {
            user_id,
            language: "en".into(),
            items: vec![],
            price_details: PriceDetails {
                total_price: dec!(0),
                total_discounted_price: dec!(0),
                discount_percent: 0,
                coupon_percent: None,
                coupon_discounted_total: None,
                shipping_cost: None,
                total_cost: dec!(0),
                currency: "USD".into(),
            },
            user_data: UserData {
                name: "Ada".into(),
                surname: "Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "+1555".into(),
            },
            shipping_data: None,
            coupon_data: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_a_document() {
        let store = InMemoryStagedOrderStore::new(Duration::from_secs(60));
        let user = Uuid::new_v4();

        assert!(!store.exists(user).await.unwrap());
        assert!(store.create(&sample_order(user)).await.unwrap());
        assert!(store.exists(user).await.unwrap());

        let loaded = store.get(user).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, user);

        assert!(store.delete(user).await.unwrap());
        assert!(store.get(user).await.unwrap().is_none());
        assert!(!store.delete(user).await.unwrap());
    }

    #[tokio::test]
    async fn create_is_conditional() {
        let store = InMemoryStagedOrderStore::new(Duration::from_secs(60));
        let user = Uuid::new_v4();

        assert!(store.create(&sample_order(user)).await.unwrap());
        assert!(!store.create(&sample_order(user)).await.unwrap());
    }

    #[tokio::test]
    async fn entries_expire() {
        let store = InMemoryStagedOrderStore::new(Duration::from_millis(20));
        let user = Uuid::new_v4();

        assert!(store.create(&sample_order(user)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.exists(user).await.unwrap());
        assert!(store.get(user).await.unwrap().is_none());
        // an expired slot can be re-created
        assert!(store.create(&sample_order(user)).await.unwrap());
    }
}
