//! Кадровые примитивы: debounce и throttle на явном времени.
//! Ничего не планируют сами - сессия опрашивает их на каждом кадре.

use std::time::{Duration, Instant};

/// Debounce по заднему фронту: срабатывает через `delay` после последнего
/// `schedule`. Последнее изменение в серии никогда не теряется.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Throttle с передним и задним фронтом. Значения внутри окна сливаются
/// через `merge` и отдаются в `poll`, когда окно закончилось.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_fire: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_fire: None, pending: None }
    }

    fn open(&self, now: Instant) -> bool {
        self.last_fire
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Передний фронт: вернёт значение сразу, если окно открыто.
    pub fn push(&mut self, now: Instant, value: T, merge: impl FnOnce(T, T) -> T) -> Option<T> {
        let value = match self.pending.take() {
            Some(prev) => merge(prev, value),
            None => value,
        };
        if self.open(now) {
            self.last_fire = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Задний фронт.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.open(now) {
            self.last_fire = Some(now);
            return self.pending.take();
        }
        None
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
