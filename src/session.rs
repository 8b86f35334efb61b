//! Интерактивная сессия карты: одна на WebSocket.
//!
//! Сессией владеет ровно один цикл (задача сокета), поэтому любое
//! отложенное действие (throttle колеса, debounce подсветки, инерция,
//! ответы сети) читает текущее состояние сессии в момент выполнения,
//! а не копию, снятую при регистрации.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::booking::{
    BookingFlow, BookingOrder, BookingStep, ContactDetails, FlowAction, FlowError, GatewayOutcome, GatewaySession,
    PaymentValidation,
};
use crate::geometry::{Bounds, GeometryIndex, Point, Rect};
use crate::models::{BoothId, BoothStatus};
use crate::overlay::{render_overlay, HighlightLayer, HoverEvent, HoverTracker, InteractionLayer};
use crate::registry::SharedRegistry;
use crate::selection::{SelectionLine, SelectionSet, Toggle};
use crate::timing::{Debouncer, Throttle};
use crate::viewport::{GestureState, MinimapFrame, Viewport, ViewportLimits};

/// Смещение пальца в пикселях экрана, после которого касание не считается тапом.
const TAP_SLOP: f64 = 10.0;

/// Параметры сессии, собираются из `InteractionConfig`/`MapConfig`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub limits: ViewportLimits,
    pub minimap: MinimapFrame,
    pub wheel_throttle: Duration,
    pub highlight_debounce: Duration,
    pub notification_ttl: Duration,
    pub success_ttl: Duration,
    pub highlight_padding: f64,
    /// Валюта сумм в корзине и окне оплаты.
    pub currency: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            limits: ViewportLimits::default(),
            minimap: MinimapFrame::default(),
            wheel_throttle: Duration::from_millis(16),
            highlight_debounce: Duration::from_millis(150),
            notification_ttl: Duration::from_millis(3000),
            success_ttl: Duration::from_millis(5000),
            highlight_padding: 12.0,
            currency: "USD".into(),
        }
    }
}

/// Общие для всех сессий данные процесса.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: SharedRegistry,
    pub svg: Arc<str>,
    pub index: Arc<GeometryIndex>,
    pub hitboxes: Arc<InteractionLayer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerLeave,
    TouchStart { touches: Vec<Point> },
    TouchMove { touches: Vec<Point> },
    TouchEnd { touches: Vec<Point> },
    Wheel { delta_y: f64, x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    Key { key: String },
    ZoomIn,
    ZoomOut,
    ResetView,
    ZoomToSelection,
    Resize { width: f64, height: f64 },
    MinimapClick { x: f64, y: f64 },
    SetCategory { category: Option<u8> },
    Toggle { booth_id: String },
    Remove { booth_id: String },
    Clear,
    SetDesign { booth_id: String, design_id: String },
    OpenBooking,
    CloseBooking,
    BookingNext,
    BookingBack,
    SetContact { contact: ContactDetails },
    SetPaymentMethod { method: String },
    SubmitBooking,
    PaymentOutcome { outcome: GatewayOutcome },
    RequestOverlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    #[serde(skip)]
    expires_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tooltip {
    pub booth_id: BoothId,
    pub status: BoothStatus,
    pub size: String,
    pub location: String,
    pub price: Option<f64>,
    pub position: Point,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub scale: f64,
    pub offset: Point,
    pub gesture: GestureState,
    pub minimap: Rect,
    pub category: Option<u8>,
    pub selection: Vec<SelectionLine>,
    pub total_price: f64,
    pub currency: String,
    /// Версия реестра, по которой собран снимок.
    pub registry_version: u64,
    pub hover: Option<Tooltip>,
    pub notifications: Vec<Notification>,
    pub booking_open: bool,
    pub booking: BookingFlow,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot(Box<SessionSnapshot>),
    Highlights { layer: HighlightLayer },
    Hover { events: Vec<HoverEvent> },
    Overlay { svg: String },
}

/// Сетевая работа, которую должен выполнить владелец сессии.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    ValidatePayment { attempt: u64, order: BookingOrder },
    InitiateGateway { attempt: u64, product_key: String, quantity: usize },
    SubmitBooking { attempt: u64, order: BookingOrder },
}

/// Результат сетевой работы, возвращается в цикл сессии.
#[derive(Debug, Clone)]
pub enum EffectResult {
    PaymentValidated { attempt: u64, result: Result<PaymentValidation, String> },
    GatewayReady { attempt: u64, result: Result<GatewaySession, String> },
    Submitted { attempt: u64, result: Result<(), String> },
}

pub struct FloorPlanSession {
    ctx: SessionContext,
    settings: SessionSettings,
    viewport: Viewport,
    minimap: MinimapFrame,
    selection: SelectionSet,
    flow: BookingFlow,
    booking_open: bool,
    category: Option<u8>,
    highlights: HighlightLayer,
    highlight_debounce: Debouncer,
    wheel: Throttle<f64>,
    pointer: Point,
    /// Стенд под нажатием: клик засчитывается, если отпускание над ним же.
    pressed: Option<BoothId>,
    press_origin: Point,
    hover: HoverTracker,
    notifications: VecDeque<Notification>,
    next_notification: u64,
    outbox: Vec<ServerMessage>,
    dirty: bool,
}

impl FloorPlanSession {
    /// Новая сессия. Первая подсветка строится сразу, без задержки.
    pub fn new(ctx: SessionContext, settings: SessionSettings) -> Self {
        let mut session = Self {
            viewport: Viewport::new(settings.limits),
            minimap: settings.minimap,
            highlight_debounce: Debouncer::new(settings.highlight_debounce),
            wheel: Throttle::new(settings.wheel_throttle),
            ctx,
            settings,
            selection: SelectionSet::new(),
            flow: BookingFlow::default(),
            booking_open: false,
            category: None,
            highlights: HighlightLayer::default(),
            pointer: Point::ZERO,
            pressed: None,
            press_origin: Point::ZERO,
            hover: HoverTracker::default(),
            notifications: VecDeque::new(),
            next_notification: 0,
            outbox: Vec::new(),
            dirty: true,
        };
        session.rebuild_highlights();
        session
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn flow(&self) -> &BookingFlow {
        &self.flow
    }

    pub fn highlights(&self) -> &HighlightLayer {
        &self.highlights
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn category(&self) -> Option<u8> {
        self.category
    }

    /// Экран (пиксели контейнера) -> координаты документа SVG.
    fn to_document(&self, screen: Point) -> Point {
        let content = self.viewport.screen_to_content(screen);
        self.ctx.index.map_to_document(content, self.minimap.map_width, self.minimap.map_height)
    }

    fn booth_at(&self, screen: Point) -> Option<BoothId> {
        self.ctx.hitboxes.hit_test(self.to_document(screen)).cloned()
    }

    pub fn handle(&mut self, msg: ClientMessage, now: Instant) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        match msg {
            ClientMessage::PointerDown { x, y } => {
                let p = Point::new(x, y);
                self.pointer = p;
                // нажатие на стенд - это клик, а не начало перетаскивания
                self.pressed = self.booth_at(p);
                if self.pressed.is_none() {
                    self.viewport.begin_drag(p, now);
                }
            }
            ClientMessage::PointerMove { x, y } => {
                let p = Point::new(x, y);
                self.pointer = p;
                if !self.viewport.drag_to(p, now) {
                    self.update_hover(p);
                }
            }
            ClientMessage::PointerUp { x, y } => {
                let p = Point::new(x, y);
                self.pointer = p;
                if let Some(id) = self.pressed.take() {
                    if self.booth_at(p).as_ref() == Some(&id) {
                        self.toggle(&id, now);
                    }
                }
                self.viewport.end_drag();
            }
            ClientMessage::PointerLeave => {
                self.pressed = None;
                self.viewport.end_drag();
                if let Some(event) = self.hover.clear() {
                    self.outbox.push(ServerMessage::Hover { events: vec![event] });
                }
            }
            ClientMessage::TouchStart { touches } => match touches.as_slice() {
                [a, b, ..] => {
                    self.pressed = None;
                    self.viewport.begin_pinch(*a, *b);
                }
                [p] => {
                    self.pointer = *p;
                    self.press_origin = *p;
                    self.pressed = self.booth_at(*p);
                    if self.pressed.is_none() {
                        self.viewport.begin_drag(*p, now);
                    }
                }
                [] => {}
            },
            ClientMessage::TouchMove { touches } => match touches.as_slice() {
                [a, b, ..] => {
                    self.viewport.pinch_to(*a, *b);
                }
                [p] => {
                    self.pointer = *p;
                    if self.viewport.drag_to(*p, now) {
                        self.pressed = None;
                    } else if self.pressed.is_some()
                        && (p.distance(self.press_origin) > TAP_SLOP || self.booth_at(*p) != self.pressed)
                    {
                        // палец ушёл со стенда: это уже не тап
                        self.pressed = None;
                    }
                }
                [] => {}
            },
            ClientMessage::TouchEnd { touches } => {
                if touches.is_empty() {
                    if let Some(id) = self.pressed.take() {
                        if self.booth_at(self.pointer).as_ref() == Some(&id) {
                            self.toggle(&id, now);
                        }
                    }
                }
                self.viewport.end_touch(touches.len());
            }
            ClientMessage::Wheel { delta_y, x, y } => {
                self.pointer = Point::new(x, y);
                if let Some(delta) = self.wheel.push(now, delta_y, |a, b| a + b) {
                    self.viewport.wheel_zoom(delta, self.pointer);
                }
            }
            ClientMessage::DoubleClick { x, y } => self.viewport.toggle_detail(Point::new(x, y)),
            ClientMessage::Key { key } => match key.as_str() {
                "+" | "=" => self.viewport.zoom_in(),
                "-" | "_" => self.viewport.zoom_out(),
                "0" | "r" | "R" => self.viewport.reset(),
                _ => return effects,
            },
            ClientMessage::ZoomIn => self.viewport.zoom_in(),
            ClientMessage::ZoomOut => self.viewport.zoom_out(),
            ClientMessage::ResetView => self.viewport.reset(),
            ClientMessage::ZoomToSelection => self.zoom_to_selection(),
            ClientMessage::Resize { width, height } => {
                self.minimap = self.minimap.with_container(width, height);
            }
            ClientMessage::MinimapClick { x, y } => {
                let offset = self.minimap.navigate_offset(Point::new(x, y), self.viewport.scale());
                self.viewport.set_offset(offset);
            }
            ClientMessage::SetCategory { category } => {
                if self.category != category {
                    self.category = category;
                    self.highlight_debounce.schedule(now);
                }
            }
            ClientMessage::Toggle { booth_id } => {
                if let Some(id) = self.parse_booth(&booth_id, now) {
                    self.toggle(&id, now);
                }
            }
            ClientMessage::Remove { booth_id } => {
                if let Some(id) = BoothId::parse(&booth_id) {
                    if self.selection.remove(&id) {
                        self.rebuild_highlights();
                    }
                }
            }
            ClientMessage::Clear => {
                if !self.selection.is_empty() {
                    self.selection.clear();
                    self.rebuild_highlights();
                }
            }
            ClientMessage::SetDesign { booth_id, design_id } => self.set_design(&booth_id, &design_id, now),
            ClientMessage::OpenBooking => {
                if self.flow.step() == BookingStep::Done {
                    self.flow.reset();
                }
                self.booking_open = true;
            }
            ClientMessage::CloseBooking => {
                self.booking_open = false;
                if !self.flow.is_busy() {
                    self.flow.reset();
                }
            }
            ClientMessage::BookingNext => {
                if let Err(e) = self.flow.next(&self.selection) {
                    self.notify(NotificationLevel::Error, e.to_string(), now);
                }
            }
            ClientMessage::BookingBack => {
                if let Err(e) = self.flow.back() {
                    debug!("Booking back rejected: {}", e);
                }
            }
            ClientMessage::SetContact { contact } => self.flow.set_contact(contact),
            ClientMessage::SetPaymentMethod { method } => self.flow.set_payment_method(method),
            ClientMessage::SubmitBooking => {
                let action = {
                    let registry = self.ctx.registry.read();
                    self.flow.submit(&self.selection, &registry)
                };
                match action {
                    Ok(action) => effects.extend(self.dispatch(action, now)),
                    Err(e) => self.notify(NotificationLevel::Error, e.to_string(), now),
                }
            }
            ClientMessage::PaymentOutcome { outcome } => match self.flow.on_gateway_outcome(outcome) {
                Ok(action) => effects.extend(self.dispatch(action, now)),
                Err(e) => debug!("Payment outcome ignored: {}", e),
            },
            ClientMessage::RequestOverlay => {
                let svg = render_overlay(&self.ctx.svg, &self.ctx.index, &self.highlights, &self.ctx.hitboxes);
                self.outbox.push(ServerMessage::Overlay { svg });
                return effects;
            }
        }
        self.dirty = true;
        effects
    }

    /// Результат сетевого шага. Ответы устаревших попыток отбрасываются.
    pub fn apply(&mut self, result: EffectResult, now: Instant) -> Vec<SessionEffect> {
        let action = match result {
            EffectResult::PaymentValidated { attempt, result } => self.flow.on_validation(attempt, result),
            EffectResult::GatewayReady { attempt, result } => self.flow.on_gateway_session(attempt, result),
            EffectResult::Submitted { attempt, result } => self.flow.on_submitted(attempt, result),
        };
        self.dirty = true;
        match action {
            Ok(action) => self.dispatch(action, now),
            Err(FlowError::Stale(attempt)) => {
                debug!("Stale result for attempt {} dropped", attempt);
                Vec::new()
            }
            Err(e) => {
                warn!("Unexpected booking result: {}", e);
                Vec::new()
            }
        }
    }

    fn dispatch(&mut self, action: FlowAction, now: Instant) -> Vec<SessionEffect> {
        match action {
            FlowAction::ValidatePayment { attempt, order } => vec![SessionEffect::ValidatePayment { attempt, order }],
            FlowAction::InitiateGateway { attempt, product_key, quantity } => {
                vec![SessionEffect::InitiateGateway { attempt, product_key, quantity }]
            }
            FlowAction::Submit { attempt, order } => vec![SessionEffect::SubmitBooking { attempt, order }],
            FlowAction::Complete { order } => {
                self.finish_booking(order, now);
                Vec::new()
            }
            FlowAction::None => Vec::new(),
        }
    }

    fn finish_booking(&mut self, order: BookingOrder, now: Instant) {
        let name = order.contact.name.trim().to_string();
        let designs = self.selection.designs().clone();
        let outcome = self
            .ctx
            .registry
            .update(|registry| registry.complete_booking(&order.booth_numbers, &name, &designs));
        match outcome {
            Ok(conflicts) if !conflicts.is_empty() => {
                warn!("Booking confirmed but {} booths were already taken", conflicts.len());
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to record booking in registry: {}", e),
        }

        let message = match order.booth_numbers.as_slice() {
            [single] => format!("Success! Booth {single} booked for {name}"),
            many => format!("Success! {} booths booked for {name}", many.len()),
        };
        info!("{}", message);
        self.notify(NotificationLevel::Info, message, now);
        self.selection.clear();
        self.booking_open = false;
        self.rebuild_highlights();
    }

    fn parse_booth(&mut self, raw: &str, now: Instant) -> Option<BoothId> {
        let id = BoothId::parse(raw);
        if id.is_none() {
            self.notify(NotificationLevel::Error, format!("Booth {raw} does not exist"), now);
        }
        id
    }

    /// Прямое переключение выбора: подсветка перестраивается сразу.
    fn toggle(&mut self, id: &BoothId, now: Instant) {
        let result = {
            let registry = self.ctx.registry.read();
            self.selection.toggle(&registry, id)
        };
        match result {
            Ok(toggle) => {
                debug!("Booth {} {}", id, if toggle == Toggle::Added { "selected" } else { "deselected" });
                self.rebuild_highlights();
            }
            Err(e) => self.notify(NotificationLevel::Error, e.to_string(), now),
        }
        self.dirty = true;
    }

    fn set_design(&mut self, raw: &str, design_id: &str, now: Instant) {
        let Some(id) = self.parse_booth(raw, now) else { return };
        let design = self.ctx.registry.read().find_design(&id, design_id);
        let result = match design {
            Some(design) => self.selection.set_design(&id, design).map_err(|e| e.to_string()),
            None => Err(format!("Design {design_id} is not available for booth {id}")),
        };
        if let Err(message) = result {
            self.notify(NotificationLevel::Error, message, now);
        }
    }

    fn update_hover(&mut self, screen: Point) {
        let hit = self.booth_at(screen);
        let events = self.hover.update(hit.as_ref(), screen);
        if !events.is_empty() {
            self.outbox.push(ServerMessage::Hover { events });
        }
    }

    /// Детальный масштаб по центру объединения границ выбранных стендов.
    pub fn zoom_to_selection(&mut self) {
        let padding = self.settings.highlight_padding;
        let bounds: Option<Bounds> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| self.ctx.index.booth_bounds(id, padding))
            .reduce(|a, b| a.union(&b));
        let Some(bounds) = bounds else { return };
        let centre = self.ctx.index.document_to_map(bounds.center(), self.minimap.map_width, self.minimap.map_height);
        let container = Point::new(self.minimap.container_width, self.minimap.container_height);
        self.viewport.focus_on(centre, container, self.viewport.limits().detail_scale);
    }

    /// Реестр изменился (каталог, чужая бронь) - перерисовка с задержкой.
    pub fn on_registry_changed(&mut self, now: Instant) {
        self.highlight_debounce.schedule(now);
        self.dirty = true;
    }

    fn rebuild_highlights(&mut self) {
        self.highlight_debounce.cancel();
        {
            let registry = self.ctx.registry.read();
            self.highlights.rebuild(
                &self.ctx.index,
                &registry,
                &self.selection.id_set(),
                self.category,
                self.settings.highlight_padding,
            );
        }
        self.outbox.push(ServerMessage::Highlights { layer: self.highlights.clone() });
    }

    fn notify(&mut self, level: NotificationLevel, message: String, now: Instant) {
        let ttl = match level {
            NotificationLevel::Error => self.settings.notification_ttl,
            NotificationLevel::Info => self.settings.success_ttl,
        };
        self.next_notification += 1;
        self.notifications.push_back(Notification {
            id: self.next_notification,
            level,
            message,
            expires_at: now + ttl,
        });
        self.dirty = true;
    }

    /// Один кадр. Возвращает `true`, если есть что отправить клиенту.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(delta) = self.wheel.poll(now) {
            // якорь - последняя позиция указателя на момент сброса
            self.viewport.wheel_zoom(delta, self.pointer);
            self.dirty = true;
        }
        let animating = self.viewport.is_animating();
        if self.viewport.step() || animating {
            // кадр, на котором инерция закончилась, тоже уходит клиенту
            self.dirty = true;
        }
        if self.highlight_debounce.poll(now) {
            self.rebuild_highlights();
        }
        let before = self.notifications.len();
        self.notifications.retain(|n| n.expires_at > now);
        if self.notifications.len() != before {
            self.dirty = true;
        }
        self.dirty || !self.outbox.is_empty()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let registry = self.ctx.registry.read();
        let hover = self.hover.current().and_then(|id| {
            registry.get(id).map(|booth| Tooltip {
                booth_id: booth.id.clone(),
                status: booth.status,
                size: booth.size.clone(),
                location: booth.location.clone(),
                price: booth.price,
                position: self.hover.position(),
            })
        });
        SessionSnapshot {
            scale: self.viewport.scale(),
            offset: self.viewport.offset(),
            gesture: self.viewport.state(),
            minimap: self.minimap.viewport_rect(&self.viewport),
            category: self.category,
            selection: self.selection.lines(&registry),
            total_price: self.selection.total_price(&registry),
            currency: self.settings.currency.clone(),
            registry_version: self.ctx.registry.version(),
            hover,
            notifications: self.notifications.iter().cloned().collect(),
            booking_open: self.booking_open,
            booking: self.flow.clone(),
        }
    }

    /// Забирает накопленные сообщения; снимок добавляется, если состояние менялось.
    pub fn take_messages(&mut self) -> Vec<ServerMessage> {
        let mut messages = std::mem::take(&mut self.outbox);
        if self.dirty {
            self.dirty = false;
            messages.push(ServerMessage::Snapshot(Box::new(self.snapshot())));
        }
        messages
    }
}
