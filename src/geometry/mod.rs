//! Индекс геометрии карты.
//!
//! Карта - чужой SVG, который мы не генерируем и не правим. Один раз на
//! загрузку документа строим индекс: каждая числовая подпись ("6", "42")
//! сопоставляется с наименьшей фигурой, внутри которой лежит её точка
//! привязки. Всё считается в координатах корня документа с учётом
//! трансформаций предков. Подписи без фигуры получают запасной бокс по
//! метрикам текста, это не ошибка.

pub mod transform;

use serde::Serialize;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::BoothId;
pub use transform::{Bounds, Point, Rect, Transform};

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Map document is not well-formed XML: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("Map document root is <{0}>, expected <svg>")]
    NotSvg(String),
}

/// Пороговые значения разбора карты.
#[derive(Debug, Clone, Copy)]
pub struct GeometryParams {
    /// Фигуры со стороной меньше - декоративные линии.
    pub min_shape_side: f64,
    /// Фигуры с площадью больше или равной - фон и стены.
    pub max_shape_area: f64,
    /// Допуск на выход точки подписи за границы фигуры.
    pub anchor_margin: f64,
    /// Размер шрифта, если в документе его нет.
    pub label_font_size: f64,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self { min_shape_side: 30.0, max_shape_area: 500_000.0, anchor_margin: 10.0, label_font_size: 24.0 }
    }
}

/// Порядковый номер подписи в документе. Стабилен для одной загрузки карты.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelKey(pub usize);

#[derive(Debug, Clone, Serialize)]
pub struct Shape {
    /// Прямоугольник в локальных координатах элемента.
    pub rect: Rect,
    pub rx: f64,
    pub ry: f64,
    /// Собственный атрибут `transform` (для копии рядом с оригиналом).
    pub transform_attr: Option<String>,
    #[serde(skip)]
    pub ctm: Transform,
    pub bounds: Bounds,
    #[serde(skip)]
    pub range: Range<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelGeometry {
    pub key: LabelKey,
    pub booth_id: BoothId,
    /// Точка привязки подписи в координатах документа.
    pub anchor: Point,
    /// Бокс текста в собственных координатах `<text>`.
    pub text_box: Rect,
    pub transform_attr: Option<String>,
    #[serde(skip)]
    pub ctm: Transform,
    /// Индекс фигуры в `GeometryIndex::shapes`, если нашлась.
    pub shape: Option<usize>,
    #[serde(skip)]
    pub range: Range<usize>,
}

impl LabelGeometry {
    pub fn is_resolved(&self) -> bool {
        self.shape.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GeometryIndex {
    labels: Vec<LabelGeometry>,
    shapes: Vec<Shape>,
    view_box: Option<Rect>,
    root_end: usize,
}

impl GeometryIndex {
    pub fn build(svg: &str, params: &GeometryParams) -> Result<Self, GeometryError> {
        let opts = roxmltree::ParsingOptions { allow_dtd: true, ..Default::default() };
        let doc = roxmltree::Document::parse_with_options(svg, opts)?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(GeometryError::NotSvg(root.tag_name().name().to_string()));
        }

        let view_box = root.attribute("viewBox").and_then(parse_view_box);
        let root_end = svg[..root.range().end].rfind("</").unwrap_or(root.range().end);

        let mut shapes = Vec::new();
        let mut texts = Vec::new();
        for node in root.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "rect" | "polygon" => {
                    if let Some(shape) = read_shape(node, params) {
                        shapes.push(shape);
                    }
                }
                "text" => texts.push(node),
                _ => {}
            }
        }

        let mut labels = Vec::new();
        for node in texts {
            let content: String = node.descendants().filter(|n| n.is_text()).filter_map(|n| n.text()).collect();
            let Some(booth_id) = BoothId::parse(&content) else { continue };

            let ctm = ctm_of(node);
            let local_anchor = Point::new(
                number_attr(node, "x").or_else(|| first_tspan_attr(node, "x")).unwrap_or(0.0),
                number_attr(node, "y").or_else(|| first_tspan_attr(node, "y")).unwrap_or(0.0),
            );
            let anchor = ctm.apply(local_anchor);
            let text_box = text_box(node, local_anchor, content.trim().chars().count(), params);

            let shape = shapes
                .iter()
                .enumerate()
                .filter(|(_, s)| s.bounds.contains_with_margin(anchor, params.anchor_margin))
                .min_by(|(_, a), (_, b)| a.bounds.area().total_cmp(&b.bounds.area()))
                .map(|(i, _)| i);

            labels.push(LabelGeometry {
                key: LabelKey(labels.len()),
                booth_id,
                anchor,
                text_box,
                transform_attr: node.attribute("transform").map(str::to_string),
                ctm,
                shape,
                range: node.range(),
            });
        }

        let index = Self { labels, shapes, view_box, root_end };
        info!(
            "Geometry index built: {} labels, {} resolved, {} candidate shapes",
            index.labels.len(),
            index.resolved_count(),
            index.shapes.len()
        );
        Ok(index)
    }

    pub fn labels(&self) -> &[LabelGeometry] {
        &self.labels
    }

    pub fn label(&self, key: LabelKey) -> Option<&LabelGeometry> {
        self.labels.get(key.0)
    }

    pub fn labels_for(&self, id: &BoothId) -> impl Iterator<Item = &LabelGeometry> + '_ {
        let id = id.clone();
        self.labels.iter().filter(move |l| l.booth_id == id)
    }

    pub fn shape(&self, index: usize) -> Option<&Shape> {
        self.shapes.get(index)
    }

    pub fn shape_for(&self, label: &LabelGeometry) -> Option<&Shape> {
        label.shape.and_then(|i| self.shapes.get(i))
    }

    pub fn resolved_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_resolved()).count()
    }

    pub fn view_box(&self) -> Option<Rect> {
        self.view_box
    }

    /// Байтовая позиция закрывающего `</svg>` в исходнике.
    pub fn root_end(&self) -> usize {
        self.root_end
    }

    /// Видимые границы подписи: фигура, иначе запасной бокс вокруг текста.
    pub fn label_bounds(&self, label: &LabelGeometry, fallback_padding: f64) -> Bounds {
        match self.shape_for(label) {
            Some(shape) => shape.bounds,
            None => label.ctm.bounds_of(&label.text_box.inflate(fallback_padding)),
        }
    }

    /// Объединение границ всех подписей стенда (в координатах документа).
    pub fn booth_bounds(&self, id: &BoothId, fallback_padding: f64) -> Option<Bounds> {
        self.labels_for(id)
            .map(|l| self.label_bounds(l, fallback_padding))
            .reduce(|a, b| a.union(&b))
    }

    /// Перевод точки документа в пиксели карты заданного размера.
    pub fn document_to_map(&self, p: Point, map_width: f64, map_height: f64) -> Point {
        match self.view_box.filter(|vb| vb.width > 0.0 && vb.height > 0.0) {
            Some(vb) => Point::new((p.x - vb.x) * map_width / vb.width, (p.y - vb.y) * map_height / vb.height),
            None => p,
        }
    }

    pub fn map_to_document(&self, p: Point, map_width: f64, map_height: f64) -> Point {
        match self.view_box.filter(|vb| vb.width > 0.0 && vb.height > 0.0) {
            Some(vb) if map_width > 0.0 && map_height > 0.0 => {
                Point::new(p.x * vb.width / map_width + vb.x, p.y * vb.height / map_height + vb.y)
            }
            _ => p,
        }
    }
}

fn read_shape(node: roxmltree::Node, params: &GeometryParams) -> Option<Shape> {
    let rect = match node.tag_name().name() {
        "rect" => Rect::new(
            number_attr(node, "x").unwrap_or(0.0),
            number_attr(node, "y").unwrap_or(0.0),
            number_attr(node, "width")?,
            number_attr(node, "height")?,
        ),
        _ => {
            let points = parse_points(node.attribute("points")?);
            Bounds::from_points(&points)?.to_rect()
        }
    };
    if rect.width < params.min_shape_side || rect.height < params.min_shape_side {
        return None;
    }
    let ctm = ctm_of(node);
    let bounds = ctm.bounds_of(&rect);
    if bounds.area() >= params.max_shape_area {
        debug!("Skipping structural shape with area {:.0}", bounds.area());
        return None;
    }
    Some(Shape {
        rect,
        rx: number_attr(node, "rx").unwrap_or(0.0),
        ry: number_attr(node, "ry").unwrap_or(0.0),
        transform_attr: node.attribute("transform").map(str::to_string),
        ctm,
        bounds,
        range: node.range(),
    })
}

/// Полная матрица элемента: трансформации предков, затем собственная.
fn ctm_of(node: roxmltree::Node) -> Transform {
    let chain: Vec<Transform> = node
        .ancestors()
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("transform"))
        .map(Transform::parse)
        .collect();
    chain.iter().rev().fold(Transform::IDENTITY, |acc, t| acc.then(t))
}

fn text_box(node: roxmltree::Node, origin: Point, chars: usize, params: &GeometryParams) -> Rect {
    let font_size = font_size(node).unwrap_or(params.label_font_size);
    let width = chars as f64 * font_size * 0.6;
    let anchor = node
        .ancestors()
        .filter_map(|n| n.attribute("text-anchor"))
        .next()
        .unwrap_or("start");
    let x = match anchor {
        "middle" => origin.x - width / 2.0,
        "end" => origin.x - width,
        _ => origin.x,
    };
    Rect::new(x, origin.y - font_size * 0.8, width, font_size)
}

fn font_size(node: roxmltree::Node) -> Option<f64> {
    node.ancestors().filter(|n| n.is_element()).find_map(|n| {
        n.attribute("font-size").and_then(parse_length).or_else(|| {
            n.attribute("style")?
                .split(';')
                .filter_map(|decl| decl.split_once(':'))
                .find(|(k, _)| k.trim() == "font-size")
                .and_then(|(_, v)| parse_length(v))
        })
    })
}

fn parse_length(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches("px").trim().parse().ok()
}

fn number_attr(node: roxmltree::Node, name: &str) -> Option<f64> {
    // x="10 20" у tspan - берём первое значение
    node.attribute(name)?.split_whitespace().next().and_then(parse_length)
}

fn first_tspan_attr(node: roxmltree::Node, name: &str) -> Option<f64> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == "tspan")
        .and_then(|t| number_attr(t, name))
}

fn parse_points(raw: &str) -> Vec<Point> {
    let nums: Vec<f64> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    nums.chunks_exact(2).map(|xy| Point::new(xy[0], xy[1])).collect()
}

fn parse_view_box(raw: &str) -> Option<Rect> {
    let nums: Vec<f64> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    match nums.as_slice() {
        [x, y, w, h] => Some(Rect::new(*x, *y, *w, *h)),
        _ => None,
    }
}
