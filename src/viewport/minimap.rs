use serde::Serialize;

use super::Viewport;
use crate::geometry::{Point, Rect};

/// Миникарта: квадрат `size` x `size`, в который вписана карта `map_width` x `map_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinimapFrame {
    pub size: f64,
    pub map_width: f64,
    pub map_height: f64,
    pub container_width: f64,
    pub container_height: f64,
}

impl Default for MinimapFrame {
    fn default() -> Self {
        Self { size: 150.0, map_width: 1200.0, map_height: 800.0, container_width: 800.0, container_height: 600.0 }
    }
}

impl MinimapFrame {
    fn factors(&self) -> Point {
        Point::new(self.size / self.map_width, self.size / self.map_height)
    }

    /// Видимая область в координатах миникарты, обрезанная по её краям.
    pub fn viewport_rect(&self, viewport: &Viewport) -> Rect {
        let k = self.factors();
        let scale = viewport.scale();
        let offset = viewport.offset();
        let x = (-offset.x / scale) * k.x;
        let y = (-offset.y / scale) * k.y;
        let w = self.container_width / scale * k.x;
        let h = self.container_height / scale * k.y;
        Rect::new(x.clamp(0.0, self.size), y.clamp(0.0, self.size), w.min(self.size), h.min(self.size))
    }

    /// Сдвиг, при котором точка клика по миникарте окажется в центре контейнера.
    /// Ограничение по пределам делает `Viewport::set_offset`.
    pub fn navigate_offset(&self, click: Point, scale: f64) -> Point {
        let k = self.factors();
        let target = Point::new(click.x / k.x * scale, click.y / k.y * scale);
        Point::new(self.container_width / 2.0 - target.x, self.container_height / 2.0 - target.y)
    }

    pub fn with_container(mut self, width: f64, height: f64) -> Self {
        if width > 0.0 && height > 0.0 {
            self.container_width = width;
            self.container_height = height;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_at_rest_covers_container_share() {
        let frame = MinimapFrame::default();
        let vp = Viewport::default();
        let r = frame.viewport_rect(&vp);
        assert_eq!((r.x, r.y), (0.0, 0.0));
        assert_eq!(r.width, 100.0);
        assert_eq!(r.height, 112.5);
    }

    #[test]
    fn rect_shrinks_with_zoom_and_is_clamped() {
        let frame = MinimapFrame::default();
        let mut vp = Viewport::default();
        vp.zoom_in();
        vp.zoom_in();
        vp.zoom_in();
        vp.zoom_in();
        vp.zoom_in();
        let r = frame.viewport_rect(&vp);
        assert!((r.width - 50.0).abs() < 1e-9);
        vp.set_offset(Point::new(400.0, 400.0));
        let r = frame.viewport_rect(&vp);
        assert_eq!((r.x, r.y), (0.0, 0.0));
    }

    #[test]
    fn click_centres_point_and_viewport_clamps() {
        let frame = MinimapFrame::default();
        let mut vp = Viewport::default();
        let offset = frame.navigate_offset(Point::new(75.0, 75.0), 1.0);
        assert_eq!(offset, Point::new(-200.0, -100.0));
        vp.set_offset(frame.navigate_offset(Point::new(150.0, 150.0), 1.0));
        assert_eq!(vp.offset(), Point::new(-500.0, -500.0));
    }
}
