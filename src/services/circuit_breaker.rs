//! Автоматический выключатель для внешних API (каталог, бронирование).
//!
//! Closed -> (порог сбоев) -> Open -> (таймаут) -> HalfOpen -> один пробный
//! запрос -> Closed или снова Open.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Нормальный режим, запросы разрешены.
    Closed,
    /// Запросы блокируются до истечения таймаута.
    Open,
    /// Разрешён пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            name,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            failure_threshold: failure_threshold.max(1),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    /// Проверка с явным временем (для тестов таймаута).
    pub fn can_execute_at(&self, now: Instant) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last = *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner);
                let expired = last.map_or(true, |t| now.saturating_duration_since(t) >= self.timeout);
                if expired {
                    *state = CircuitState::HalfOpen;
                    info!("Circuit breaker [{}] transitioning to HalfOpen state", self.name);
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state == CircuitState::HalfOpen {
            info!("Circuit breaker [{}] recovered - transitioning to Closed state", self.name);
        }
        if *state != CircuitState::Open {
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed if failures >= self.failure_threshold => {
                *state = CircuitState::Open;
                error!(
                    "Circuit breaker [{}] OPENED - {} failures reached threshold {}",
                    self.name, failures, self.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker [{}] test failed - returning to Open state", self.name);
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Выполняет запрос через выключатель. Отказ сервиса - это транспортная
    /// ошибка или 5xx; отказ в бизнес-смысле (4xx, `result: false`) сбоем не считается.
    pub async fn call<T, F>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        if !self.can_execute() {
            warn!("Circuit breaker is OPEN - blocking {} request", self.name);
            return Err(ServiceError::CircuitOpen(self.name));
        }
        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) if e.is_outage() => {
                error!("{} request failed: {}", self.name, e);
                self.record_failure();
                Err(e)
            }
            Err(e) => {
                self.record_success();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_and_half_opens_after_timeout() {
        let cb = CircuitBreaker::new("catalog", 2, 60);
        let t0 = Instant::now();
        cb.record_failure_at(t0);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure_at(t0);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute_at(t0 + Duration::from_secs(59)));
        assert!(cb.can_execute_at(t0 + Duration::from_secs(60)));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens() {
        let cb = CircuitBreaker::new("booking", 1, 1);
        let t0 = Instant::now();
        cb.record_failure_at(t0);
        assert!(cb.can_execute_at(t0 + Duration::from_secs(2)));
        cb.record_failure_at(t0 + Duration::from_secs(2));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute_at(t0 + Duration::from_millis(2500)));
    }

    #[tokio::test]
    async fn open_breaker_short_circuits() {
        let cb = CircuitBreaker::new("catalog", 1, 3600);
        let err = cb
            .call(async { Err::<(), _>(ServiceError::Status { service: "catalog", status: 503 }) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 503, .. }));
        let err = cb.call(async { Ok::<_, ServiceError>(1) }).await.unwrap_err();
        assert!(matches!(err, ServiceError::CircuitOpen("catalog")));
    }

    #[tokio::test]
    async fn client_errors_do_not_trip_the_breaker() {
        let cb = CircuitBreaker::new("booking", 1, 3600);
        let _ = cb.call(async { Err::<(), _>(ServiceError::Rejected("no".into())) }).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
