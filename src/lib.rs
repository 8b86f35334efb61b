pub mod booking;
pub mod config;
pub mod controllers;
pub mod error;
pub mod geometry;
pub mod models;
pub mod overlay;
pub mod registry;
pub mod selection;
pub mod services;
pub mod session;
pub mod timing;
pub mod viewport;

use std::sync::Arc;
use tracing::info;

use geometry::GeometryIndex;
use overlay::InteractionLayer;
use registry::{BoothRegistry, SharedRegistry};
use services::{Advisories, BookingClient, CatalogClient, CatalogSync, PaymentMethods};
use session::SessionContext;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub registry: SharedRegistry,
    pub svg: Arc<str>,
    pub index: Arc<GeometryIndex>,
    pub hitboxes: Arc<InteractionLayer>,
    pub catalog: CatalogClient,
    pub booking: BookingClient,
    pub payment_methods: PaymentMethods,
    pub advisories: Advisories,
}

impl AppState {
    /// Собирает состояние из уже прочитанной карты. Без сети и фоновых задач.
    pub fn build(config: config::Config, svg: String) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let registry = BoothRegistry::initialize(config.registry.strict)?;
        let index = GeometryIndex::build(&svg, &config.map.geometry_params())?;
        let hitboxes = InteractionLayer::build(&index, config.map.hitbox_padding);
        info!("Interaction layer ready: {} hitboxes", hitboxes.len());

        let catalog = CatalogClient::from_config(&config.catalog, &config.circuit_breaker)?;
        let booking = BookingClient::from_config(&config.booking, &config.catalog, &config.circuit_breaker)?;

        Ok(Self {
            registry: SharedRegistry::new(registry),
            svg: Arc::from(svg),
            index: Arc::new(index),
            hitboxes: Arc::new(hitboxes),
            catalog,
            booking,
            payment_methods: PaymentMethods::default(),
            advisories: Advisories::default(),
            config,
        })
    }

    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let svg = tokio::fs::read_to_string(&config.map.svg_path).await?;
        info!("Floor plan loaded from {} ({} bytes)", config.map.svg_path, svg.len());
        let state = Arc::new(Self::build(config, svg)?);

        // Синхронизация с каталогом в фоне: первый прогон сразу
        let sync = CatalogSync {
            client: state.catalog.clone(),
            registry: state.registry.clone(),
            payment_methods: state.payment_methods.clone(),
            advisories: state.advisories.clone(),
            booked_product_code: state.config.catalog.booked_product_code.clone(),
        };
        sync.spawn(std::time::Duration::from_secs(state.config.catalog.refresh_seconds));

        Ok(state)
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: self.registry.clone(),
            svg: self.svg.clone(),
            index: self.index.clone(),
            hitboxes: self.hitboxes.clone(),
        }
    }
}
