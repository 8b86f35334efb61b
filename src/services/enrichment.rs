//! Фоновая синхронизация реестра с каталогом.
//!
//! Три шага (пакеты, занятые стенды, способы оплаты) независимы: сбой
//! одного не отменяет остальные. Сбой превращается в предупреждение,
//! реестр остаётся в последнем известном состоянии.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{CatalogClient, ServiceError};
use crate::models::PaymentMethod;
use crate::registry::{EnrichReport, MarkReport, SharedRegistry};

const MAX_ADVISORIES: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    pub source: &'static str,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Журнал некритичных проблем с данными (последние `MAX_ADVISORIES`).
#[derive(Debug, Clone, Default)]
pub struct Advisories {
    inner: Arc<RwLock<VecDeque<Advisory>>>,
}

impl Advisories {
    pub fn push(&self, source: &'static str, message: impl Into<String>) {
        let advisory = Advisory { source, message: message.into(), at: Utc::now() };
        warn!("Advisory from {}: {}", advisory.source, advisory.message);
        let mut list = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if list.len() == MAX_ADVISORIES {
            list.pop_front();
        }
        list.push_back(advisory);
    }

    pub fn list(&self) -> Vec<Advisory> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }
}

/// Способы оплаты, полученные из каталога.
#[derive(Debug, Clone, Default)]
pub struct PaymentMethods {
    inner: Arc<RwLock<Vec<PaymentMethod>>>,
}

impl PaymentMethods {
    pub fn replace(&self, methods: Vec<PaymentMethod>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = methods;
    }

    pub fn list(&self) -> Vec<PaymentMethod> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub enriched: Option<EnrichReport>,
    pub booked: Option<MarkReport>,
    pub payment_methods: Option<usize>,
}

#[derive(Clone)]
pub struct CatalogSync {
    pub client: CatalogClient,
    pub registry: SharedRegistry,
    pub payment_methods: PaymentMethods,
    pub advisories: Advisories,
    /// Код продукта для списка броней; пусто - код первого продукта каталога.
    pub booked_product_code: String,
}

impl CatalogSync {
    pub async fn run_once(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let products = match self.client.list_packages().await {
            Ok(packages) => {
                let enriched = self.registry.update(|r| r.enrich(&packages.products));
                info!(
                    "Registry enriched: {} by id, {} by size, {} unmatched",
                    enriched.matched_by_id, enriched.matched_by_size, enriched.unmatched
                );
                report.enriched = Some(enriched);
                if let Some(methods) = packages.payment_method.filter(|m| !m.is_empty()) {
                    report.payment_methods = Some(methods.len());
                    self.payment_methods.replace(methods);
                }
                packages.products
            }
            Err(e) => {
                self.degrade("catalog", "Unable to load booth packages; showing default booth data", &e);
                Vec::new()
            }
        };

        let code = Some(self.booked_product_code.clone())
            .filter(|c| !c.is_empty())
            .or_else(|| products.first().map(|p| p.product_code.clone()).filter(|c| !c.is_empty()));
        if let Some(code) = code {
            match self.client.booked_booths(&code).await {
                Ok(ids) => {
                    let marked = self.registry.update(|r| r.mark_booked(ids.as_slice()));
                    if !marked.unknown.is_empty() {
                        warn!("Bookings reference unknown booths: {:?}", marked.unknown);
                    }
                    info!("{} booths newly marked as booked", marked.newly_booked.len());
                    report.booked = Some(marked);
                }
                Err(e) => self.degrade("bookings", "Unable to load booked booths; availability may be stale", &e),
            }
        }

        if let Some(product_id) = products.first().and_then(|p| p.id.clone()) {
            match self.client.product_details(&product_id).await {
                Ok(methods) if !methods.is_empty() => {
                    report.payment_methods = Some(methods.len());
                    self.payment_methods.replace(methods);
                }
                Ok(_) => {}
                Err(e) => self.degrade("payment_methods", "Unable to load payment methods", &e),
            }
        }

        report
    }

    fn degrade(&self, source: &'static str, message: &str, error: &ServiceError) {
        self.advisories.push(source, format!("{message} ({error})"));
    }

    /// Первый прогон сразу, дальше каждые `every`.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}
