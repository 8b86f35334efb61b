//! Аффинные преобразования SVG и базовая геометрия.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

/// Прямоугольник в локальных координатах элемента (атрибуты x/y/width/height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn inflate(&self, pad: f64) -> Rect {
        Rect::new(self.x - pad, self.y - pad, self.width + 2.0 * pad, self.height + 2.0 * pad)
    }
}

/// Осевой ограничивающий прямоугольник в координатах документа.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let first = points.first()?;
        let init = Bounds { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
        Some(points[1..].iter().fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains_with_margin(&self, p: Point, margin: f64) -> bool {
        p.x >= self.min_x - margin
            && p.x <= self.max_x + margin
            && p.y >= self.min_y - margin
            && p.y <= self.max_y + margin
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn inflate(&self, pad: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min_x, self.min_y, self.width(), self.height())
    }
}

/// Матрица SVG `matrix(a b c d e f)`:
/// x' = a*x + c*y + e, y' = b*x + d*y + f.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Transform { e: tx, f: ty, ..Self::IDENTITY }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Transform { a: sx, d: sy, ..Self::IDENTITY }
    }

    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Transform { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 }
    }

    pub fn rotate_about(degrees: f64, cx: f64, cy: f64) -> Self {
        Self::translate(cx, cy).then(&Self::rotate(degrees)).then(&Self::translate(-cx, -cy))
    }

    /// `self * other`: сначала применяется `other`, потом `self`
    /// (порядок как в списке `transform="A B"`).
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(self.a * p.x + self.c * p.y + self.e, self.b * p.x + self.d * p.y + self.f)
    }

    pub fn inverse(&self) -> Option<Transform> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Transform {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// AABB повёрнутого прямоугольника: преобразуем все четыре угла.
    pub fn bounds_of(&self, rect: &Rect) -> Bounds {
        let corners = rect.corners().map(|c| self.apply(c));
        Bounds::from_points(&corners).unwrap_or(Bounds { min_x: 0.0, min_y: 0.0, max_x: 0.0, max_y: 0.0 })
    }

    /// Разбор атрибута `transform`. Неизвестные функции пропускаются,
    /// пустой или битый атрибут даёт единичную матрицу.
    pub fn parse(attr: &str) -> Transform {
        let mut result = Transform::IDENTITY;
        let mut rest = attr;
        while let Some(open) = rest.find('(') {
            let name = rest[..open].trim_matches(|c: char| c.is_whitespace() || c == ',');
            let Some(close) = rest[open..].find(')') else { break };
            let args: Vec<f64> = rest[open + 1..open + close]
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            rest = &rest[open + close + 1..];

            let step = match (name, args.as_slice()) {
                ("translate", [tx]) => Transform::translate(*tx, 0.0),
                ("translate", [tx, ty, ..]) => Transform::translate(*tx, *ty),
                ("scale", [s]) => Transform::scale(*s, *s),
                ("scale", [sx, sy, ..]) => Transform::scale(*sx, *sy),
                ("rotate", [deg]) => Transform::rotate(*deg),
                ("rotate", [deg, cx, cy, ..]) => Transform::rotate_about(*deg, *cx, *cy),
                ("skewX", [deg, ..]) => Transform { c: deg.to_radians().tan(), ..Transform::IDENTITY },
                ("skewY", [deg, ..]) => Transform { b: deg.to_radians().tan(), ..Transform::IDENTITY },
                ("matrix", [a, b, c, d, e, f, ..]) => Transform { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f },
                _ => continue,
            };
            result = result.then(&step);
        }
        result
    }

    pub fn to_svg(&self) -> String {
        format!("matrix({} {} {} {} {} {})", self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn parses_translate_then_rotate() {
        let t = Transform::parse("translate(100, 50) rotate(90)");
        // rotate(90): (10, 0) -> (0, 10), потом сдвиг
        assert!(close(t.apply(Point::new(10.0, 0.0)), Point::new(100.0, 60.0)));
    }

    #[test]
    fn rotate_about_center_keeps_center() {
        let t = Transform::parse("rotate(45 20 20)");
        assert!(close(t.apply(Point::new(20.0, 20.0)), Point::new(20.0, 20.0)));
    }

    #[test]
    fn rotated_rect_bounds_cover_all_corners() {
        let rect = Rect::new(-10.0, -5.0, 20.0, 10.0);
        let b = Transform::rotate(90.0).bounds_of(&rect);
        assert!((b.width() - 10.0).abs() < 1e-9);
        assert!((b.height() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_round_trips() {
        let t = Transform::parse("matrix(2 0.5 -0.3 1.5 10 -4)");
        let inv = t.inverse().unwrap();
        let p = Point::new(3.0, 7.0);
        assert!(close(inv.apply(t.apply(p)), p));
    }

    #[test]
    fn garbage_is_identity() {
        assert!(Transform::parse("").is_identity());
        assert!(Transform::parse("wobble(3)").is_identity());
        assert!(Transform::parse("translate(").is_identity());
    }
}
