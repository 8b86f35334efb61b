use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{check_status, CircuitBreaker, ServiceError};
use crate::config::{CatalogConfig, CircuitBreakerConfig};
use crate::models::catalog::{BookingsResponse, PackagesResponse, ProductDetails};
use crate::models::PaymentMethod;

const SERVICE: &str = "catalog";

/// Клиент каталога выставки. Все три запроса только читают данные.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    event_code: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl CatalogClient {
    pub fn from_config(config: &CatalogConfig, breaker: &CircuitBreakerConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            // список занятых стендов отдаётся по сессионной cookie
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            event_code: config.event_code.clone(),
            circuit_breaker: Arc::new(CircuitBreaker::new(SERVICE, breaker.failure_threshold, breaker.timeout_seconds)),
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub async fn list_packages(&self) -> Result<PackagesResponse, ServiceError> {
        let url = format!("{}/Get-Exibition-Packages-Full/List-All", self.base_url);
        let operation = async {
            let response = self.http_client.get(&url).header("Authorization", &self.event_code).send().await?;
            Ok::<_, ServiceError>(check_status(SERVICE, response)?.json::<PackagesResponse>().await?)
        };
        let packages = self.circuit_breaker.call(operation).await?;
        info!("Catalog returned {} products", packages.products.len());
        Ok(packages)
    }

    pub async fn product_details(&self, product_id: &str) -> Result<Vec<PaymentMethod>, ServiceError> {
        let url = format!("{}/Get-Exibition-Packages-Full/Details/{}", self.base_url, product_id);
        let operation = async {
            let response = self.http_client.get(&url).header("Authorization", &self.event_code).send().await?;
            Ok::<_, ServiceError>(check_status(SERVICE, response)?.json::<ProductDetails>().await?)
        };
        let details = self.circuit_breaker.call(operation).await?;
        Ok(details.payment_method.unwrap_or_default())
    }

    /// Номера занятых стендов (колонка 14, через запятую).
    pub async fn booked_booths(&self, product_code: &str) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/Get-Exhibition-Bookings/GetBookings/{}", self.base_url, product_code);
        let operation = async {
            let response = self
                .http_client
                .get(&url)
                .query(&[("draw", "1"), ("start", "0"), ("length", "1000")])
                .send()
                .await?;
            Ok::<_, ServiceError>(check_status(SERVICE, response)?.json::<BookingsResponse>().await?)
        };
        let bookings = self.circuit_breaker.call(operation).await?;
        let booths = bookings.booth_numbers();
        debug!("{} booking rows, {} booked booth numbers", bookings.data.len(), booths.len());
        Ok(booths)
    }
}
