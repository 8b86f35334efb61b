//! Вспомогательные слои поверх карты: невидимые зоны клика (hitbox)
//! и динамическая подсветка. Исходный документ не меняется.

pub mod highlight;
pub mod render;

use serde::Serialize;

use crate::geometry::{GeometryIndex, LabelKey, Point, Rect, Transform};
use crate::models::BoothId;

pub use highlight::{classify, HighlightClass, HighlightLayer, HighlightRect, LabelStyle};
pub use render::{render_overlay, strip_overlay, OVERLAY_MARKER};

#[derive(Debug, Clone, Serialize)]
pub struct Hitbox {
    pub booth_id: BoothId,
    pub label: LabelKey,
    /// Прямоугольник в собственных координатах подписи.
    pub rect: Rect,
    #[serde(skip)]
    pub ctm: Transform,
    #[serde(skip)]
    inverse: Option<Transform>,
}

impl Hitbox {
    pub fn contains(&self, doc_point: Point) -> bool {
        self.inverse.is_some_and(|inv| self.rect.contains(inv.apply(doc_point)))
    }
}

/// Слой кликабельных зон: ровно одна зона на номер стенда.
#[derive(Debug, Clone, Default)]
pub struct InteractionLayer {
    hitboxes: Vec<Hitbox>,
}

impl InteractionLayer {
    pub fn build(index: &GeometryIndex, padding: f64) -> Self {
        let mut hitboxes: Vec<Hitbox> = Vec::new();
        for label in index.labels() {
            // несколько подписей с одним номером - берём первую
            if hitboxes.iter().any(|h| h.booth_id == label.booth_id) {
                continue;
            }
            hitboxes.push(Hitbox {
                booth_id: label.booth_id.clone(),
                label: label.key,
                rect: label.text_box.inflate(padding),
                ctm: label.ctm,
                inverse: label.ctm.inverse(),
            });
        }
        Self { hitboxes }
    }

    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    pub fn len(&self) -> usize {
        self.hitboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hitboxes.is_empty()
    }

    /// Попадание в координатах документа; верхняя (последняя) зона побеждает.
    pub fn hit_test(&self, doc_point: Point) -> Option<&BoothId> {
        self.hitboxes.iter().rev().find(|h| h.contains(doc_point)).map(|h| &h.booth_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoverEvent {
    Enter { booth_id: BoothId, position: Point },
    Move { booth_id: BoothId, position: Point },
    Leave { booth_id: BoothId },
}

/// Отслеживает стенд под курсором. В любой момент наведён максимум один.
#[derive(Debug, Clone, Default)]
pub struct HoverTracker {
    current: Option<BoothId>,
    position: Point,
}

impl HoverTracker {
    pub fn current(&self) -> Option<&BoothId> {
        self.current.as_ref()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn update(&mut self, hit: Option<&BoothId>, position: Point) -> Vec<HoverEvent> {
        self.position = position;
        match (self.current.take(), hit) {
            (Some(prev), Some(id)) if &prev == id => {
                self.current = Some(prev);
                vec![HoverEvent::Move { booth_id: id.clone(), position }]
            }
            (prev, next) => {
                let mut events = Vec::with_capacity(2);
                if let Some(prev) = prev {
                    events.push(HoverEvent::Leave { booth_id: prev });
                }
                if let Some(id) = next {
                    self.current = Some(id.clone());
                    events.push(HoverEvent::Enter { booth_id: id.clone(), position });
                }
                events
            }
        }
    }

    pub fn clear(&mut self) -> Option<HoverEvent> {
        self.current.take().map(|booth_id| HoverEvent::Leave { booth_id })
    }
}
