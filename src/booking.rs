//! Мастер бронирования: дизайны -> контакты -> проверка -> (оплата) -> отправка.
//!
//! Здесь только переходы. Сетевые вызовы делает сессия, а результаты
//! возвращаются через `on_*` вместе с номером попытки: ответ от старой
//! попытки (например, после отмены) игнорируется.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::BoothId;
use crate::registry::BoothRegistry;
use crate::selection::SelectionSet;

pub const MSG_METHOD_REJECTED: &str = "This payment method is not currently accepted.";
pub const MSG_VALIDATION_FAILED: &str = "Failed to validate payment method. Please try again.";
pub const MSG_GATEWAY_INIT_FAILED: &str = "Unable to initialize payment. Please try again.";
pub const MSG_VERIFICATION_FAILED: &str = "Payment verification failed. Please try again.";
pub const MSG_PAYMENT_CANCELLED: &str = "Payment was cancelled";
pub const MSG_SUBMIT_FAILED: &str = "Failed to submit booking. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    SelectingDesigns,
    EnteringDetails,
    Reviewing,
    PaymentPending,
    Submitting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("Cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: BookingStep, to: BookingStep },

    #[error("Choose a design for every selected booth")]
    DesignsIncomplete,

    #[error("{0}")]
    InvalidDetails(String),

    #[error("Select a payment method")]
    MissingPaymentMethod,

    #[error("Booths no longer available: {0}")]
    BoothsTaken(String),

    #[error("Ignoring result of superseded attempt {0}")]
    Stale(u64),
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Контактные данные заказчика.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContactDetails {
    #[validate(
        custom(function = "not_blank", message = "Contact name is required"),
        length(max = 200, message = "Contact name is too long")
    )]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 40, message = "Phone number is too long"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Company name is too long"))]
    pub company: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Message is too long"))]
    pub message: String,
}

impl ContactDetails {
    /// Первое сообщение об ошибке в порядке полей формы.
    pub fn check(&self) -> Result<(), FlowError> {
        self.validate().map_err(|errors| FlowError::InvalidDetails(first_message(&errors)))
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    ["name", "email", "phone", "company", "country", "message"]
        .iter()
        .filter_map(|name| fields.get(*name))
        .filter_map(|errs| errs.first())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

/// Ответ проверки способа оплаты.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentValidation {
    pub accepted: bool,
    /// Перед записью брони нужна интерактивная оплата через шлюз.
    pub requires_gateway: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewaySession {
    pub session_id: String,
    /// Должен совпасть с `resultIndicator` из колбэка завершения.
    #[serde(skip_serializing)]
    pub result_indicator: String,
    pub order_id: String,
}

/// Что сообщил виджет оплаты.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Completed { result_indicator: String },
    Cancelled,
    Failed { explanation: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub token: String,
    pub session_id: String,
    pub order_id: String,
}

/// Данные заказа для сервиса бронирования.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingOrder {
    pub product_key: String,
    pub contact: ContactDetails,
    pub booth_numbers: Vec<BoothId>,
    pub payment_method: String,
    pub receipt: Option<PaymentReceipt>,
}

impl BookingOrder {
    pub fn quantity(&self) -> usize {
        self.booth_numbers.len()
    }

    pub fn booth_numbers_joined(&self) -> String {
        self.booth_numbers.iter().map(BoothId::as_str).collect::<Vec<_>>().join(",")
    }
}

/// Следующий сетевой шаг, который должна выполнить сессия.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    ValidatePayment { attempt: u64, order: BookingOrder },
    InitiateGateway { attempt: u64, product_key: String, quantity: usize },
    Submit { attempt: u64, order: BookingOrder },
    /// Бронь подтверждена: сессия пишет реестр и очищает корзину.
    Complete { order: BookingOrder },
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingFlow {
    step: BookingStep,
    contact: ContactDetails,
    payment_method: Option<String>,
    error: Option<String>,
    /// Идёт проверка способа оплаты (шаг остаётся `Reviewing`).
    validating: bool,
    gateway: Option<GatewaySession>,
    #[serde(skip)]
    draft: Option<BookingOrder>,
    attempt: u64,
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self {
            step: BookingStep::SelectingDesigns,
            contact: ContactDetails::default(),
            payment_method: None,
            error: None,
            validating: false,
            gateway: None,
            draft: None,
            attempt: 0,
        }
    }
}

impl BookingFlow {
    pub fn step(&self) -> BookingStep {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn gateway(&self) -> Option<&GatewaySession> {
        self.gateway.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.validating || matches!(self.step, BookingStep::Submitting)
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn set_contact(&mut self, contact: ContactDetails) {
        self.contact = contact;
    }

    pub fn set_payment_method(&mut self, method: impl Into<String>) {
        let method = method.into();
        self.payment_method = Some(method).filter(|m| !m.trim().is_empty());
    }

    /// Вперёд на один шаг (только из первых двух шагов мастера).
    pub fn next(&mut self, selection: &SelectionSet) -> Result<BookingStep, FlowError> {
        match self.step {
            BookingStep::SelectingDesigns => {
                if !selection.all_designs_selected() {
                    return Err(FlowError::DesignsIncomplete);
                }
                self.step = BookingStep::EnteringDetails;
            }
            BookingStep::EnteringDetails => {
                self.contact.check()?;
                self.step = BookingStep::Reviewing;
            }
            from => return Err(FlowError::InvalidTransition { from, to: from }),
        }
        self.error = None;
        Ok(self.step)
    }

    /// Назад строго на один шаг.
    pub fn back(&mut self) -> Result<BookingStep, FlowError> {
        let to = match self.step {
            BookingStep::EnteringDetails => BookingStep::SelectingDesigns,
            BookingStep::Reviewing if !self.validating => BookingStep::EnteringDetails,
            from => return Err(FlowError::InvalidTransition { from, to: from }),
        };
        self.step = to;
        self.error = None;
        Ok(to)
    }

    /// Старт оплаты из `Reviewing`: готовит заказ и просит проверить способ оплаты.
    pub fn submit(&mut self, selection: &SelectionSet, registry: &BoothRegistry) -> Result<FlowAction, FlowError> {
        if self.step != BookingStep::Reviewing || self.validating {
            return Err(FlowError::InvalidTransition { from: self.step, to: BookingStep::Submitting });
        }
        if !selection.all_designs_selected() {
            return Err(FlowError::DesignsIncomplete);
        }
        self.contact.check()?;
        let payment_method = self.payment_method.clone().ok_or(FlowError::MissingPaymentMethod)?;
        let taken = selection.unavailable_in(registry);
        if !taken.is_empty() {
            let list = taken.iter().map(BoothId::as_str).collect::<Vec<_>>().join(", ");
            self.error = Some(format!("Booths no longer available: {list}"));
            return Err(FlowError::BoothsTaken(list));
        }

        let first = &selection.ids()[0];
        let product_key = registry
            .get(first)
            .and_then(|b| b.primary_product())
            .map(|p| p.product_code.clone())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| first.to_string());

        let order = BookingOrder {
            product_key,
            contact: self.contact.clone(),
            booth_numbers: selection.ids().to_vec(),
            payment_method,
            receipt: None,
        };
        self.attempt += 1;
        self.validating = true;
        self.error = None;
        self.gateway = None;
        self.draft = Some(order.clone());
        info!("Booking attempt {} started for {} booths", self.attempt, order.quantity());
        Ok(FlowAction::ValidatePayment { attempt: self.attempt, order })
    }

    fn ensure_current(&self, attempt: u64) -> Result<(), FlowError> {
        if attempt != self.attempt {
            debug!("Dropping result of attempt {} (current {})", attempt, self.attempt);
            return Err(FlowError::Stale(attempt));
        }
        Ok(())
    }

    fn fail(&mut self, message: impl Into<String>) -> FlowAction {
        let message = message.into();
        warn!("Booking attempt {} failed: {}", self.attempt, message);
        self.step = BookingStep::Reviewing;
        self.validating = false;
        self.gateway = None;
        self.error = Some(message);
        FlowAction::None
    }

    pub fn on_validation(
        &mut self,
        attempt: u64,
        result: Result<PaymentValidation, String>,
    ) -> Result<FlowAction, FlowError> {
        self.ensure_current(attempt)?;
        if !self.validating {
            return Err(FlowError::Stale(attempt));
        }
        self.validating = false;
        let Some(order) = self.draft.clone() else {
            return Ok(self.fail(MSG_VALIDATION_FAILED));
        };
        match result {
            Err(e) => {
                debug!("Payment validation transport error: {}", e);
                Ok(self.fail(MSG_VALIDATION_FAILED))
            }
            Ok(v) if !v.accepted => Ok(self.fail(MSG_METHOD_REJECTED)),
            Ok(v) if v.requires_gateway => {
                self.step = BookingStep::PaymentPending;
                Ok(FlowAction::InitiateGateway {
                    attempt,
                    quantity: order.quantity(),
                    product_key: order.product_key,
                })
            }
            Ok(_) => {
                self.step = BookingStep::Submitting;
                Ok(FlowAction::Submit { attempt, order })
            }
        }
    }

    pub fn on_gateway_session(
        &mut self,
        attempt: u64,
        result: Result<GatewaySession, String>,
    ) -> Result<FlowAction, FlowError> {
        self.ensure_current(attempt)?;
        if self.step != BookingStep::PaymentPending {
            return Err(FlowError::Stale(attempt));
        }
        match result {
            Ok(session) if !session.session_id.is_empty() => {
                info!("Gateway session {} ready for order {}", session.session_id, session.order_id);
                self.gateway = Some(session);
                Ok(FlowAction::None)
            }
            Ok(_) => Ok(self.fail(MSG_GATEWAY_INIT_FAILED)),
            Err(e) => {
                debug!("Gateway session error: {}", e);
                Ok(self.fail(MSG_GATEWAY_INIT_FAILED))
            }
        }
    }

    /// Колбэк виджета оплаты. Бронь без совпавшего токена не пишется.
    pub fn on_gateway_outcome(&mut self, outcome: GatewayOutcome) -> Result<FlowAction, FlowError> {
        if self.step != BookingStep::PaymentPending {
            return Err(FlowError::InvalidTransition { from: self.step, to: BookingStep::Submitting });
        }
        let Some(session) = self.gateway.clone() else {
            return Err(FlowError::Stale(self.attempt));
        };
        match outcome {
            GatewayOutcome::Completed { result_indicator } if result_indicator == session.result_indicator => {
                let Some(mut order) = self.draft.clone() else {
                    return Ok(self.fail(MSG_SUBMIT_FAILED));
                };
                order.receipt = Some(PaymentReceipt {
                    token: result_indicator,
                    session_id: session.session_id,
                    order_id: session.order_id,
                });
                self.draft = Some(order.clone());
                self.gateway = None;
                self.step = BookingStep::Submitting;
                Ok(FlowAction::Submit { attempt: self.attempt, order })
            }
            GatewayOutcome::Completed { .. } => Ok(self.fail(MSG_VERIFICATION_FAILED)),
            GatewayOutcome::Cancelled => Ok(self.fail(MSG_PAYMENT_CANCELLED)),
            GatewayOutcome::Failed { explanation } => {
                let reason = explanation.unwrap_or_else(|| "Payment processing error".to_string());
                Ok(self.fail(format!("Payment failed: {reason}")))
            }
        }
    }

    pub fn on_submitted(&mut self, attempt: u64, result: Result<(), String>) -> Result<FlowAction, FlowError> {
        self.ensure_current(attempt)?;
        if self.step != BookingStep::Submitting {
            return Err(FlowError::Stale(attempt));
        }
        match result {
            Ok(()) => {
                let Some(order) = self.draft.take() else {
                    return Ok(self.fail(MSG_SUBMIT_FAILED));
                };
                info!("Booking attempt {} confirmed", attempt);
                self.step = BookingStep::Done;
                self.error = None;
                Ok(FlowAction::Complete { order })
            }
            Err(e) => {
                debug!("Booking submit error: {}", e);
                Ok(self.fail(MSG_SUBMIT_FAILED))
            }
        }
    }

    /// Новый цикл мастера; номер попытки сохраняется, чтобы старые ответы
    /// не применились к новому циклу.
    pub fn reset(&mut self) {
        let attempt = self.attempt + 1;
        *self = Self { attempt, ..Self::default() };
    }
}
