//! Route distance lookup against an OSRM-compatible routing API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::errors::ServiceError;

/// A geographic point as (longitude, latitude), the routing API's axis order.
pub type GeoPoint = (f64, f64);

/// Route summary between two points.
#[derive(Debug, Clone, Copy)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait RouteClient: Send + Sync {
    /// Resolves the driving route from `from` to `to`. Failures are explicit:
    /// an unreachable routing service never degrades to a zero distance.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSummary, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

/// OSRM HTTP routing client with a bounded per-request deadline.
#[derive(Clone)]
pub struct HttpRouteClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRouteClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("routing client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl RouteClient for HttpRouteClient {
    #[instrument(skip(self))]
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSummary, ServiceError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url.trim_end_matches('/'),
            from.0,
            from.1,
            to.0,
            to.1,
        );

        let response = self.client.get(&url).send().await.map_err(|err| {
            if err.is_timeout() {
                ServiceError::Timeout("Routing service did not respond in time".to_string())
            } else {
                ServiceError::ExternalServiceError(format!("Routing request failed: {}", err))
            }
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Routing service returned {}",
                response.status()
            )));
        }

        let body: OsrmResponse = response.json().await.map_err(|err| {
            ServiceError::ExternalServiceError(format!("Routing response unreadable: {}", err))
        })?;

        if body.code != "Ok" {
            warn!(code = %body.code, "routing service rejected the request");
            return Err(ServiceError::ExternalServiceError(format!(
                "Routing service rejected the request: {}",
                body.code
            )));
        }

        let route = body.routes.first().ok_or_else(|| {
            ServiceError::ExternalServiceError("Routing service returned no routes".to_string())
        })?;

        Ok(RouteSummary {
            distance_meters: route.distance,
            duration_seconds: route.duration,
        })
    }
}
