pub mod booking;
pub mod catalog;
pub mod circuit_breaker;
pub mod enrichment;

use thiserror::Error;

pub use booking::BookingClient;
pub use catalog::CatalogClient;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use enrichment::{Advisories, Advisory, CatalogSync, PaymentMethods};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} service temporarily unavailable (circuit open)")]
    CircuitOpen(&'static str),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} service responded with status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response payload: {0}")]
    Unexpected(String),
}

impl ServiceError {
    /// Ошибки, которые говорят о недоступности сервиса, а не об отказе по существу.
    pub fn is_outage(&self) -> bool {
        match self {
            ServiceError::Transport(_) => true,
            ServiceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Проверка статуса ответа в стиле `error_for_status`, но с именем сервиса.
pub(crate) fn check_status(service: &'static str, response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::Status { service, status: status.as_u16() })
    }
}

/// Истинность поля ответа: `true`, `"true"`, `"SUCCESS"`, ненулевое число.
pub(crate) fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false")
        }
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(serde_json::Value::Array(_)) | Some(serde_json::Value::Object(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_false_and_zero_are_rejections() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("true"))));
        assert!(truthy(Some(&json!("SUCCESS"))));
        assert!(truthy(Some(&json!(1))));
        assert!(!truthy(Some(&json!("false"))));
        assert!(!truthy(Some(&json!(" FALSE "))));
        assert!(!truthy(Some(&json!("0"))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(None));
    }
}
