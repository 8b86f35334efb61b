use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::GeometryParams;
use crate::session::SessionSettings;
use crate::viewport::{MinimapFrame, ViewportLimits};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid { key: &'static str, value: String, expected: &'static str },

    #[error("{key} is out of range: {reason}")]
    OutOfRange { key: &'static str, reason: &'static str },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub catalog: CatalogConfig,
    pub booking: BookingConfig,
    pub map: MapConfig,
    pub interaction: InteractionConfig,
    pub registry: RegistryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Каталог выставки (пакеты, детали продукта, занятые стенды)
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub event_code: String,
    pub booked_product_code: String,
    pub refresh_seconds: u64,
    pub timeout_seconds: u64,
}

// Сервис бронирования и платёжный шлюз
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub base_url: String,
    pub currency: String,
    pub timeout_seconds: u64,
}

// Карта и построение индекса геометрии
#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    pub svg_path: String,
    pub min_shape_side: f64,
    pub max_shape_area: f64,
    pub anchor_margin: f64,
    pub label_font_size: f64,
    pub highlight_padding: f64,
    pub hitbox_padding: f64,
}

// Жесты, таймеры и размеры вида
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    pub max_pan: f64,
    pub friction: f64,
    pub min_velocity: f64,
    pub momentum_threshold: f64,
    pub wheel_sensitivity: f64,
    pub zoom_step: f64,
    pub fit_scale: f64,
    pub detail_scale: f64,
    pub wheel_throttle_ms: u64,
    pub highlight_debounce_ms: u64,
    pub frame_ms: u64,
    pub notification_ms: u64,
    pub success_notification_ms: u64,
    pub minimap_size: f64,
    pub map_width: f64,
    pub map_height: f64,
    pub container_width: f64,
    pub container_height: f64,
}

// Проверка справочника стендов при старте
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub strict: bool,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

fn var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: &str, expected: &'static str) -> Result<T, ConfigError> {
    let value = var(key, default);
    value.trim().parse().map_err(|_| ConfigError::Invalid { key, value, expected })
}

fn number(key: &'static str, default: &str) -> Result<f64, ConfigError> {
    let value: f64 = parsed(key, default, "number")?;
    if !value.is_finite() {
        return Err(ConfigError::OutOfRange { key, reason: "must be finite" });
    }
    Ok(value)
}

fn positive(key: &'static str, default: &str) -> Result<f64, ConfigError> {
    let value = number(key, default)?;
    if value <= 0.0 {
        return Err(ConfigError::OutOfRange { key, reason: "must be positive" });
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config {
            app: AppConfig {
                host: var("HOST", "0.0.0.0"),
                port: parsed("PORT", "8000", "port number")?,
                environment: var("ENVIRONMENT", "development"),
                rust_log: var("RUST_LOG", "booth_floorplan=debug,tower_http=debug"),
            },
            catalog: CatalogConfig {
                base_url: var("CATALOG_BASE_URL", "https://api.example.com/api"),
                event_code: var("EVENT_CODE", ""),
                booked_product_code: var("BOOKED_PRODUCT_CODE", ""),
                refresh_seconds: parsed("CATALOG_REFRESH_SECONDS", "300", "number of seconds")?,
                timeout_seconds: parsed("CATALOG_TIMEOUT_SECONDS", "10", "number of seconds")?,
            },
            booking: BookingConfig {
                base_url: var("BOOKING_BASE_URL", "https://api.example.com/api"),
                currency: var("BOOKING_CURRENCY", "USD"),
                timeout_seconds: parsed("BOOKING_TIMEOUT_SECONDS", "30", "number of seconds")?,
            },
            map: MapConfig {
                svg_path: var("MAP_SVG_PATH", "assets/floorplan.svg"),
                min_shape_side: positive("MAP_MIN_SHAPE_SIDE", "30")?,
                max_shape_area: positive("MAP_MAX_SHAPE_AREA", "500000")?,
                anchor_margin: number("MAP_ANCHOR_MARGIN", "10")?,
                label_font_size: positive("MAP_LABEL_FONT_SIZE", "24")?,
                highlight_padding: number("MAP_HIGHLIGHT_PADDING", "12")?,
                hitbox_padding: number("MAP_HITBOX_PADDING", "35")?,
            },
            interaction: InteractionConfig {
                min_scale: positive("VIEW_MIN_SCALE", "0.5")?,
                max_scale: positive("VIEW_MAX_SCALE", "5.0")?,
                max_pan: positive("VIEW_MAX_PAN", "500")?,
                friction: positive("VIEW_FRICTION", "0.92")?,
                min_velocity: positive("VIEW_MIN_VELOCITY", "0.1")?,
                momentum_threshold: number("VIEW_MOMENTUM_THRESHOLD", "1.0")?,
                wheel_sensitivity: positive("VIEW_WHEEL_SENSITIVITY", "0.001")?,
                zoom_step: positive("VIEW_ZOOM_STEP", "0.2")?,
                fit_scale: positive("VIEW_FIT_SCALE", "1.0")?,
                detail_scale: positive("VIEW_DETAIL_SCALE", "2.0")?,
                wheel_throttle_ms: parsed("WHEEL_THROTTLE_MS", "16", "number of milliseconds")?,
                highlight_debounce_ms: parsed("HIGHLIGHT_DEBOUNCE_MS", "150", "number of milliseconds")?,
                frame_ms: parsed("FRAME_MS", "16", "number of milliseconds")?,
                notification_ms: parsed("NOTIFICATION_MS", "3000", "number of milliseconds")?,
                success_notification_ms: parsed("SUCCESS_NOTIFICATION_MS", "5000", "number of milliseconds")?,
                minimap_size: positive("MINIMAP_SIZE", "150")?,
                map_width: positive("MAP_WIDTH", "1200")?,
                map_height: positive("MAP_HEIGHT", "800")?,
                container_width: positive("CONTAINER_WIDTH", "800")?,
                container_height: positive("CONTAINER_HEIGHT", "600")?,
            },
            registry: RegistryConfig {
                strict: parsed("REGISTRY_STRICT", "false", "boolean")?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parsed("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5", "number")?,
                timeout_seconds: parsed("CIRCUIT_BREAKER_TIMEOUT_SECONDS", "60", "number of seconds")?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let i = &self.interaction;
        if i.min_scale > i.max_scale {
            return Err(ConfigError::OutOfRange { key: "VIEW_MIN_SCALE", reason: "must not exceed VIEW_MAX_SCALE" });
        }
        if i.friction >= 1.0 {
            return Err(ConfigError::OutOfRange { key: "VIEW_FRICTION", reason: "must be below 1" });
        }
        if i.frame_ms == 0 {
            return Err(ConfigError::OutOfRange { key: "FRAME_MS", reason: "must be positive" });
        }
        Ok(())
    }
}

impl MapConfig {
    pub fn geometry_params(&self) -> GeometryParams {
        GeometryParams {
            min_shape_side: self.min_shape_side,
            max_shape_area: self.max_shape_area,
            anchor_margin: self.anchor_margin,
            label_font_size: self.label_font_size,
        }
    }
}

impl InteractionConfig {
    pub fn limits(&self) -> ViewportLimits {
        ViewportLimits {
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            max_pan: self.max_pan,
            friction: self.friction,
            min_velocity: self.min_velocity,
            momentum_threshold: self.momentum_threshold,
            wheel_sensitivity: self.wheel_sensitivity,
            zoom_step: self.zoom_step,
            fit_scale: self.fit_scale,
            detail_scale: self.detail_scale,
        }
    }

    pub fn minimap(&self) -> MinimapFrame {
        MinimapFrame {
            size: self.minimap_size,
            map_width: self.map_width,
            map_height: self.map_height,
            container_width: self.container_width,
            container_height: self.container_height,
        }
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        let i = &self.interaction;
        SessionSettings {
            limits: i.limits(),
            minimap: i.minimap(),
            wheel_throttle: Duration::from_millis(i.wheel_throttle_ms),
            highlight_debounce: Duration::from_millis(i.highlight_debounce_ms),
            notification_ttl: Duration::from_millis(i.notification_ms),
            success_ttl: Duration::from_millis(i.success_notification_ms),
            highlight_padding: self.map.highlight_padding,
            currency: self.booking.currency.clone(),
        }
    }
}
