//! HTTP implementations of the collaborator lookups.
//!
//! Each client targets a sibling service's base URL; 404 responses map to
//! `Ok(None)` for by-id lookups, everything else non-2xx is a dependency
//! failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::ServiceError;

use super::{
    BasketClient, BasketEntry, CatalogClient, CatalogProduct, CouponClient, CouponRecord,
    CustomerAddress, CustomerClient, CustomerProfile, WarehouseAddress,
};

fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::InternalError(format!("lookup client: {}", e)))
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<T>, ServiceError> {
    let response = client.get(url).send().await.map_err(|err| {
        ServiceError::ExternalServiceError(format!("GET {} failed: {}", url, err))
    })?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(ServiceError::ExternalServiceError(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    let body = response.json::<T>().await.map_err(|err| {
        ServiceError::ExternalServiceError(format!("GET {} unreadable: {}", url, err))
    })?;
    Ok(Some(body))
}

#[derive(Clone)]
pub struct HttpBasketClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBasketClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl BasketClient for HttpBasketClient {
    async fn items(&self, user_id: Uuid) -> Result<Vec<BasketEntry>, ServiceError> {
        let url = format!(
            "{}/api/v1/baskets/{}/items",
            self.base_url.trim_end_matches('/'),
            user_id
        );
        Ok(get_json::<Vec<BasketEntry>>(&self.client, &url)
            .await?
            .unwrap_or_default())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let url = format!(
            "{}/api/v1/baskets/{}",
            self.base_url.trim_end_matches('/'),
            user_id
        );
        let response = self.client.delete(&url).send().await.map_err(|err| {
            ServiceError::ExternalServiceError(format!("DELETE {} failed: {}", url, err))
        })?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(ServiceError::ExternalServiceError(format!(
                "DELETE {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn product_by_sku(
        &self,
        language: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, ServiceError> {
        let url = format!(
            "{}/api/v1/products/{}/{}",
            self.base_url.trim_end_matches('/'),
            language,
            sku
        );
        get_json(&self.client, &url).await
    }
}

#[derive(Clone)]
pub struct HttpCustomerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCustomerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl CustomerClient for HttpCustomerClient {
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<CustomerProfile>, ServiceError> {
        let url = format!(
            "{}/api/v1/users/{}",
            self.base_url.trim_end_matches('/'),
            user_id
        );
        get_json(&self.client, &url).await
    }

    async fn address_by_id(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<CustomerAddress>, ServiceError> {
        let url = format!(
            "{}/api/v1/users/{}/addresses/{}",
            self.base_url.trim_end_matches('/'),
            user_id,
            address_id
        );
        get_json(&self.client, &url).await
    }

    async fn warehouse_address(&self) -> Result<WarehouseAddress, ServiceError> {
        let url = format!(
            "{}/api/v1/warehouse/address",
            self.base_url.trim_end_matches('/')
        );
        get_json(&self.client, &url).await?.ok_or_else(|| {
            ServiceError::ExternalServiceError("No warehouse address is configured".to_string())
        })
    }
}

#[derive(Clone)]
pub struct HttpCouponClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCouponClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl CouponClient for HttpCouponClient {
    async fn coupon_by_code(
        &self,
        code: &str,
        language: &str,
    ) -> Result<Option<CouponRecord>, ServiceError> {
        let url = format!(
            "{}/api/v1/coupons/{}?language={}",
            self.base_url.trim_end_matches('/'),
            code,
            language
        );
        get_json(&self.client, &url).await
    }
}
