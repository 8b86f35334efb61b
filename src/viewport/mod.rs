//! Контроллер вида: масштаб, сдвиг и жесты.
//!
//! Экранная точка `p` соответствует точке карты `(p - offset) / scale`.
//! Все записи в `offset` проходят через `clamp_offset`, включая шаги инерции.
//! Время передаётся снаружи (`Instant`), поэтому контроллер детерминирован.

pub mod minimap;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::geometry::Point;

pub use minimap::MinimapFrame;

/// Длительность кадра, к которой нормируется скорость.
const FRAME_MS: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLimits {
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
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 5.0,
            max_pan: 500.0,
            friction: 0.92,
            min_velocity: 0.1,
            momentum_threshold: 1.0,
            wheel_sensitivity: 0.001,
            zoom_step: 0.2,
            fit_scale: 1.0,
            detail_scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureState {
    Idle,
    Dragging,
    Pinching,
    MomentumAnimating,
}

#[derive(Debug, Clone, Copy)]
struct DragTrack {
    // указатель минус сдвиг в момент захвата
    grab: Point,
    last_pos: Point,
    last_time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PinchTrack {
    start_distance: f64,
    start_scale: f64,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    limits: ViewportLimits,
    scale: f64,
    offset: Point,
    velocity: Point,
    state: GestureState,
    drag: Option<DragTrack>,
    pinch: Option<PinchTrack>,
}

impl Viewport {
    pub fn new(limits: ViewportLimits) -> Self {
        Self {
            scale: limits.fit_scale,
            limits,
            offset: Point::ZERO,
            velocity: Point::ZERO,
            state: GestureState::Idle,
            drag: None,
            pinch: None,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn velocity(&self) -> Point {
        self.velocity
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn limits(&self) -> &ViewportLimits {
        &self.limits
    }

    pub fn is_animating(&self) -> bool {
        self.state == GestureState::MomentumAnimating
    }

    pub fn screen_to_content(&self, p: Point) -> Point {
        (p - self.offset) * (1.0 / self.scale)
    }

    pub fn content_to_screen(&self, p: Point) -> Point {
        p * self.scale + self.offset
    }

    /// Останавливает инерцию. Вызывается синхронно перед любым новым жестом.
    pub fn cancel_momentum(&mut self) {
        if self.state == GestureState::MomentumAnimating {
            debug!("Momentum cancelled at velocity ({:.2}, {:.2})", self.velocity.x, self.velocity.y);
            self.state = GestureState::Idle;
        }
        self.velocity = Point::ZERO;
    }

    pub fn begin_drag(&mut self, pos: Point, now: Instant) {
        self.cancel_momentum();
        self.pinch = None;
        self.drag = Some(DragTrack { grab: pos - self.offset, last_pos: pos, last_time: now });
        self.state = GestureState::Dragging;
    }

    /// Возвращает `false`, если перетаскивания нет.
    pub fn drag_to(&mut self, pos: Point, now: Instant) -> bool {
        if self.state != GestureState::Dragging {
            return false;
        }
        let Some(track) = self.drag.as_mut() else {
            return false;
        };
        let dt = now.saturating_duration_since(track.last_time).as_nanos() as f64 / 1_000_000.0;
        if dt > 0.0 {
            self.velocity = (pos - track.last_pos) * (FRAME_MS / dt);
            track.last_pos = pos;
            track.last_time = now;
        }
        let target = pos - track.grab;
        self.offset = self.clamp_offset(target);
        true
    }

    /// Отпускание: инерция, если последняя скорость выше порога.
    pub fn end_drag(&mut self) -> GestureState {
        if self.state != GestureState::Dragging {
            return self.state;
        }
        self.drag = None;
        if self.velocity.length() > self.limits.momentum_threshold {
            self.state = GestureState::MomentumAnimating;
        } else {
            self.velocity = Point::ZERO;
            self.state = GestureState::Idle;
        }
        self.state
    }

    pub fn begin_pinch(&mut self, a: Point, b: Point) {
        self.cancel_momentum();
        self.drag = None;
        self.pinch = Some(PinchTrack { start_distance: a.distance(b), start_scale: self.scale });
        self.state = GestureState::Pinching;
    }

    pub fn pinch_to(&mut self, a: Point, b: Point) -> bool {
        let Some(pinch) = self.pinch.filter(|_| self.state == GestureState::Pinching) else {
            return false;
        };
        if pinch.start_distance <= f64::EPSILON {
            return false;
        }
        let target = pinch.start_scale * a.distance(b) / pinch.start_distance;
        self.zoom_at(target, a.midpoint(b));
        true
    }

    /// Пальцы убраны; `remaining` - сколько осталось на экране.
    pub fn end_touch(&mut self, remaining: usize) -> GestureState {
        match self.state {
            GestureState::Pinching if remaining < 2 => {
                self.pinch = None;
                self.state = GestureState::Idle;
            }
            GestureState::Dragging if remaining == 0 => {
                self.end_drag();
            }
            GestureState::Dragging => {
                self.drag = None;
                self.velocity = Point::ZERO;
                self.state = GestureState::Idle;
            }
            _ => {}
        }
        self.state
    }

    /// Один кадр инерции. `false`, когда анимация закончилась или не шла.
    pub fn step(&mut self) -> bool {
        if self.state != GestureState::MomentumAnimating {
            return false;
        }
        self.velocity = self.velocity * self.limits.friction;
        if self.velocity.x.abs() < self.limits.min_velocity && self.velocity.y.abs() < self.limits.min_velocity {
            self.velocity = Point::ZERO;
            self.state = GestureState::Idle;
            return false;
        }
        self.offset = self.clamp_offset(self.offset + self.velocity);
        true
    }

    /// Масштаб с привязкой: точка карты под `anchor` остаётся на месте
    /// (если не вмешался предел сдвига).
    pub fn zoom_at(&mut self, target_scale: f64, anchor: Point) {
        let new_scale = self.clamp_scale(target_scale);
        let ratio = new_scale / self.scale;
        let offset = anchor - (anchor - self.offset) * ratio;
        self.scale = new_scale;
        self.offset = self.clamp_offset(offset);
    }

    pub fn wheel_zoom(&mut self, delta_y: f64, anchor: Point) {
        self.cancel_momentum();
        let target = self.scale - delta_y * self.limits.wheel_sensitivity;
        self.zoom_at(target, anchor);
    }

    /// Двойной клик: "обзор" <-> "детально" с привязкой к точке клика.
    pub fn toggle_detail(&mut self, anchor: Point) {
        self.cancel_momentum();
        let midpoint = (self.limits.fit_scale + self.limits.detail_scale) / 2.0;
        let target = if self.scale < midpoint { self.limits.detail_scale } else { self.limits.fit_scale };
        self.zoom_at(target, anchor);
    }

    pub fn zoom_in(&mut self) {
        self.cancel_momentum();
        self.scale = self.clamp_scale(self.scale + self.limits.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.cancel_momentum();
        self.scale = self.clamp_scale(self.scale - self.limits.zoom_step);
    }

    pub fn reset(&mut self) {
        self.cancel_momentum();
        self.drag = None;
        self.pinch = None;
        self.state = GestureState::Idle;
        self.scale = self.limits.fit_scale;
        self.offset = Point::ZERO;
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.cancel_momentum();
        self.offset = self.clamp_offset(offset);
    }

    /// Центрирует точку карты в контейнере на заданном масштабе.
    pub fn focus_on(&mut self, map_point: Point, container: Point, scale: f64) {
        self.cancel_momentum();
        self.scale = self.clamp_scale(scale);
        let offset = container * 0.5 - map_point * self.scale;
        self.offset = self.clamp_offset(offset);
    }

    fn clamp_scale(&self, s: f64) -> f64 {
        if s.is_finite() {
            s.clamp(self.limits.min_scale, self.limits.max_scale)
        } else {
            self.scale
        }
    }

    fn clamp_offset(&self, p: Point) -> Point {
        let m = self.limits.max_pan;
        let x = if p.x.is_finite() { p.x.clamp(-m, m) } else { self.offset.x };
        let y = if p.y.is_finite() { p.y.clamp(-m, m) } else { self.offset.y };
        Point::new(x, y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    #[test]
    fn drag_moves_offset_and_tracks_velocity() {
        let t0 = Instant::now();
        let mut vp = Viewport::default();
        vp.begin_drag(Point::new(100.0, 100.0), t0);
        assert_eq!(vp.state(), GestureState::Dragging);
        assert!(vp.drag_to(Point::new(132.0, 100.0), ms(t0, 16)));
        assert_eq!(vp.offset(), Point::new(32.0, 0.0));
        assert_eq!(vp.velocity(), Point::new(32.0, 0.0));
        assert_eq!(vp.end_drag(), GestureState::MomentumAnimating);
    }

    #[test]
    fn slow_release_goes_idle() {
        let t0 = Instant::now();
        let mut vp = Viewport::default();
        vp.begin_drag(Point::new(0.0, 0.0), t0);
        vp.drag_to(Point::new(1.0, 0.0), ms(t0, 100));
        assert_eq!(vp.end_drag(), GestureState::Idle);
        assert_eq!(vp.velocity(), Point::ZERO);
    }

    #[test]
    fn momentum_is_cancelled_by_new_drag() {
        let t0 = Instant::now();
        let mut vp = Viewport::default();
        vp.begin_drag(Point::ZERO, t0);
        vp.drag_to(Point::new(40.0, 40.0), ms(t0, 16));
        vp.end_drag();
        assert!(vp.step());
        vp.begin_drag(Point::new(10.0, 10.0), ms(t0, 40));
        assert_eq!(vp.state(), GestureState::Dragging);
        assert_eq!(vp.velocity(), Point::ZERO);
        assert!(!vp.step());
    }

    #[test]
    fn wheel_zoom_is_anchored_and_clamped() {
        let mut vp = Viewport::default();
        let anchor = Point::new(200.0, 150.0);
        let before = vp.screen_to_content(anchor);
        vp.wheel_zoom(-500.0, anchor);
        assert!((vp.scale() - 1.5).abs() < 1e-12);
        let after = vp.screen_to_content(anchor);
        assert!(before.distance(after) < 1e-9);

        vp.wheel_zoom(-100_000.0, anchor);
        assert_eq!(vp.scale(), 5.0);
        assert!(vp.offset().x >= -500.0 && vp.offset().y >= -500.0);
    }

    #[test]
    fn double_click_toggles_fit_and_detail() {
        let mut vp = Viewport::default();
        vp.toggle_detail(Point::new(100.0, 100.0));
        assert_eq!(vp.scale(), 2.0);
        assert_eq!(vp.offset(), Point::new(-100.0, -100.0));
        vp.toggle_detail(Point::new(100.0, 100.0));
        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.offset(), Point::ZERO);
    }

    #[test]
    fn pinch_scales_from_baseline() {
        let mut vp = Viewport::default();
        vp.begin_pinch(Point::new(100.0, 100.0), Point::new(200.0, 100.0));
        assert!(vp.pinch_to(Point::new(50.0, 100.0), Point::new(250.0, 100.0)));
        assert!((vp.scale() - 2.0).abs() < 1e-12);
        assert_eq!(vp.end_touch(1), GestureState::Idle);
        assert!(!vp.pinch_to(Point::new(0.0, 0.0), Point::new(10.0, 0.0)));
    }

    #[test]
    fn buttons_step_without_anchoring() {
        let mut vp = Viewport::default();
        vp.set_offset(Point::new(40.0, -20.0));
        vp.zoom_in();
        assert!((vp.scale() - 1.2).abs() < 1e-12);
        assert_eq!(vp.offset(), Point::new(40.0, -20.0));
        for _ in 0..10 {
            vp.zoom_out();
        }
        assert_eq!(vp.scale(), 0.5);
        vp.reset();
        assert_eq!((vp.scale(), vp.offset()), (1.0, Point::ZERO));
    }

    #[test]
    fn focus_centres_point() {
        let mut vp = Viewport::default();
        vp.focus_on(Point::new(300.0, 200.0), Point::new(800.0, 600.0), 2.0);
        assert_eq!(vp.offset(), Point::new(-200.0, -100.0));
        assert_eq!(vp.content_to_screen(Point::new(300.0, 200.0)), Point::new(400.0, 300.0));
    }
}
