//! Клиент сервиса бронирования: проверка способа оплаты, сессия шлюза,
//! запись брони. Формы уходят как multipart, в том порядке полей,
//! который ожидает бэкенд.

use reqwest::multipart::Form;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{check_status, truthy, CircuitBreaker, ServiceError};
use crate::booking::{BookingOrder, GatewaySession, PaymentValidation};
use crate::config::{BookingConfig, CatalogConfig, CircuitBreakerConfig};

const SERVICE: &str = "booking";
const FIELD_NAME: &str = "exhibition_email_english";
const APPLICATION: &str = "exhibition";
// так поле называется на стороне API
const APPLICATION_ID_FIELD: &str = "appication_id";
const APPLICATION_ID: &str = "Exhibition";

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct BookingClient {
    http_client: reqwest::Client,
    base_url: String,
    event_code: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl BookingClient {
    pub fn from_config(
        config: &BookingConfig,
        catalog: &CatalogConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds)).build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            event_code: catalog.event_code.clone(),
            circuit_breaker: Arc::new(CircuitBreaker::new(SERVICE, breaker.failure_threshold, breaker.timeout_seconds)),
        })
    }

    fn order_form(&self, order: &BookingOrder) -> Form {
        let c = &order.contact;
        Form::new()
            .text("product_key", order.product_key.clone())
            .text("name", c.name.clone())
            .text("email", c.email.clone())
            .text("phone", c.phone.clone())
            .text("company", c.company.clone())
            .text("country", c.country.clone())
            .text("message", c.message.clone())
            .text("quantity", order.quantity().to_string())
            .text("payment_method", order.payment_method.clone())
            .text("booth_numbers", order.booth_numbers_joined())
            .text("event_code", self.event_code.clone())
            .text("field_name", FIELD_NAME)
            .text("application", APPLICATION)
            .text(APPLICATION_ID_FIELD, APPLICATION_ID)
    }

    async fn post_form(&self, path: &str, form: Form, authorize: bool) -> Result<Envelope, ServiceError> {
        let url = format!("{}/{}", self.base_url, path);
        let operation = async {
            let mut request = self.http_client.post(&url).multipart(form);
            if authorize {
                request = request.header("Authorization", &self.event_code);
            }
            let response = check_status(SERVICE, request.send().await?)?;
            Ok::<_, ServiceError>(response.json::<Envelope>().await?)
        };
        self.circuit_breaker.call(operation).await
    }

    /// `data.result` - принят ли способ оплаты; `data.direct_payment == "true"` -
    /// перед записью брони нужна оплата через шлюз.
    pub async fn validate_payment_method(&self, order: &BookingOrder) -> Result<PaymentValidation, ServiceError> {
        let envelope = self.post_form("Validate-Payment-Method", self.order_form(order), false).await?;
        let data = envelope.data.unwrap_or_default();
        let validation = PaymentValidation {
            accepted: truthy(data.get("result")),
            requires_gateway: data.get("direct_payment").and_then(Value::as_str) == Some("true"),
        };
        debug!("Payment method {} validation: {:?}", order.payment_method, validation);
        Ok(validation)
    }

    pub async fn initiate_gateway_session(
        &self,
        product_key: &str,
        quantity: usize,
    ) -> Result<GatewaySession, ServiceError> {
        let form = Form::new()
            .text("product_id", product_key.to_string())
            .text("quantity", quantity.to_string())
            .text("event_code", self.event_code.clone())
            .text("application", APPLICATION);
        let envelope = self.post_form("Initiate-Gateway-Session", form, false).await?;
        let data = envelope.data.unwrap_or_default();

        if data.get("result").and_then(Value::as_str) != Some("SUCCESS") {
            let reason = envelope.message.unwrap_or_else(|| "Payment gateway session initialization failed".into());
            warn!("Gateway session rejected: {}", reason);
            return Err(ServiceError::Rejected(reason));
        }
        let session_id = data
            .get("payment_session")
            .and_then(session_id)
            .ok_or_else(|| ServiceError::Unexpected("missing payment_session".into()))?;
        let result_indicator = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unexpected("missing token".into()))?
            .to_string();
        let order_id = data.get("orderId").map(value_text).unwrap_or_default();

        info!("Gateway session {} initiated for order {}", session_id, order_id);
        Ok(GatewaySession { session_id, result_indicator, order_id })
    }

    pub async fn submit_booking(&self, order: &BookingOrder) -> Result<(), ServiceError> {
        let (token, session, order_id) = match &order.receipt {
            Some(r) => (r.token.clone(), r.session_id.clone(), r.order_id.clone()),
            None => Default::default(),
        };
        let form = self
            .order_form(order)
            .text("payment_token", token)
            .text("payment_session", session)
            .text("order_id", order_id)
            .text("event_code", self.event_code.clone())
            .text("product_key", order.product_key.clone());
        let envelope = self.post_form("Book-Exibition-Packages", form, true).await?;
        info!(
            "Booking submitted for booths {}: {}",
            order.booth_numbers_joined(),
            envelope.message.as_deref().unwrap_or("ok")
        );
        Ok(())
    }
}

// payment_session бывает строкой или объектом с id
fn session_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => ["id", "sessionId", "session_id"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_id_accepts_string_or_object() {
        assert_eq!(session_id(&json!("SESSION01")), Some("SESSION01".into()));
        assert_eq!(session_id(&json!({"sessionId": "S2"})), Some("S2".into()));
        assert_eq!(session_id(&json!({"other": 1})), Some(r#"{"other":1}"#.into()));
        assert_eq!(session_id(&json!("")), None);
    }

    #[test]
    fn order_id_text() {
        assert_eq!(value_text(&json!(1234)), "1234");
        assert_eq!(value_text(&json!("ORD-1")), "ORD-1");
    }
}
