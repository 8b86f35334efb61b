use serde::Serialize;
use std::collections::HashSet;

use crate::geometry::{Bounds, GeometryIndex, LabelKey, Rect};
use crate::models::{Booth, BoothId, BoothStatus};
use crate::registry::BoothRegistry;

pub const SELECTED_FILL: &str = "#007bff";
pub const SELECTED_STROKE: &str = "#0056b3";
pub const AVAILABLE_FILL: &str = "#28a745";
pub const BOOKED_FILL: &str = "#8B4789";
pub const RESERVED_FILL: &str = "#ffc107";
pub const STROKE_WIDTH: f64 = 3.0;
const FALLBACK_RADIUS: f64 = 6.0;

/// Итог таблицы приоритетов для одного стенда.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "class", content = "status", rename_all = "snake_case")]
pub enum HighlightClass {
    Selected,
    CategoryMatch(BoothStatus),
    Dimmed,
    Plain,
}

impl HighlightClass {
    /// (fill, stroke) или `None`, если прямоугольник не рисуется.
    pub fn colors(self) -> Option<(&'static str, &'static str)> {
        match self {
            HighlightClass::Selected => Some((SELECTED_FILL, SELECTED_STROKE)),
            HighlightClass::CategoryMatch(BoothStatus::Available) => Some((AVAILABLE_FILL, AVAILABLE_FILL)),
            HighlightClass::CategoryMatch(BoothStatus::Booked) => Some((BOOKED_FILL, BOOKED_FILL)),
            HighlightClass::CategoryMatch(BoothStatus::Reserved) => Some((RESERVED_FILL, RESERVED_FILL)),
            HighlightClass::Dimmed | HighlightClass::Plain => None,
        }
    }

    pub fn label_style(self) -> Option<LabelStyle> {
        match self {
            HighlightClass::Selected | HighlightClass::CategoryMatch(_) => Some(LabelStyle::Emphasized),
            HighlightClass::Dimmed => Some(LabelStyle::Dimmed),
            HighlightClass::Plain => None,
        }
    }
}

/// selected > совпадение категории (цвет по статусу) > несовпадение > ничего.
pub fn classify(selected: bool, category_filter: Option<u8>, booth: Option<&Booth>) -> HighlightClass {
    match (selected, category_filter, booth) {
        (true, _, _) => HighlightClass::Selected,
        (false, Some(cat), Some(b)) if b.category == cat => HighlightClass::CategoryMatch(b.status),
        (false, Some(_), Some(_)) => HighlightClass::Dimmed,
        _ => HighlightClass::Plain,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    Emphasized,
    Dimmed,
}

/// Куда вставляется прямоугольник подсветки в исходном документе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Placement {
    /// Сразу после фигуры стенда: над белой заливкой, под текстом.
    AfterShape(usize),
    /// Перед текстом подписи (запасной бокс).
    BeforeLabel(LabelKey),
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightRect {
    pub booth_id: BoothId,
    pub label: LabelKey,
    pub class: HighlightClass,
    pub fill: &'static str,
    pub stroke: &'static str,
    /// Локальная геометрия копии: координаты фигуры либо бокс текста с отступом.
    pub rect: Rect,
    pub rx: f64,
    pub ry: f64,
    pub transform: Option<String>,
    pub placement: Placement,
    /// Те же границы в координатах документа (для клиентского рендера).
    pub bounds: Bounds,
}

/// Слой подсветки. Каждый `rebuild` начинает с пустого слоя.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HighlightLayer {
    rects: Vec<HighlightRect>,
    label_styles: Vec<(LabelKey, LabelStyle)>,
    generation: u64,
}

impl HighlightLayer {
    pub fn rects(&self) -> &[HighlightRect] {
        &self.rects
    }

    pub fn label_styles(&self) -> &[(LabelKey, LabelStyle)] {
        &self.label_styles
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.rects.clear();
        self.label_styles.clear();
    }

    pub fn rebuild(
        &mut self,
        index: &GeometryIndex,
        registry: &BoothRegistry,
        selected: &HashSet<BoothId>,
        category_filter: Option<u8>,
        fallback_padding: f64,
    ) {
        self.clear();
        self.generation += 1;

        for label in index.labels() {
            let booth = registry.get(&label.booth_id);
            let class = classify(selected.contains(&label.booth_id), category_filter, booth);
            if let Some(style) = class.label_style() {
                self.label_styles.push((label.key, style));
            }
            let Some((fill, stroke)) = class.colors() else { continue };

            let rect = match index.shape_for(label) {
                Some(shape) => HighlightRect {
                    booth_id: label.booth_id.clone(),
                    label: label.key,
                    class,
                    fill,
                    stroke,
                    rect: shape.rect,
                    rx: shape.rx,
                    ry: shape.ry,
                    transform: shape.transform_attr.clone(),
                    placement: Placement::AfterShape(label.shape.unwrap_or_default()),
                    bounds: shape.bounds,
                },
                None => HighlightRect {
                    booth_id: label.booth_id.clone(),
                    label: label.key,
                    class,
                    fill,
                    stroke,
                    rect: label.text_box.inflate(fallback_padding),
                    rx: FALLBACK_RADIUS,
                    ry: FALLBACK_RADIUS,
                    transform: label.transform_attr.clone(),
                    placement: Placement::BeforeLabel(label.key),
                    bounds: index.label_bounds(label, fallback_padding),
                },
            };
            self.rects.push(rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryParams;

    const MAP: &str = r#"<svg>
  <rect x="0" y="0" width="100" height="100" rx="4"/>
  <text x="50" y="50">6</text>
  <text x="400" y="400">32</text>
  <text x="800" y="800">99</text>
</svg>"#;

    fn fixture() -> (GeometryIndex, BoothRegistry) {
        let index = GeometryIndex::build(MAP, &GeometryParams::default()).unwrap();
        let registry = BoothRegistry::initialize(true).unwrap();
        (index, registry)
    }

    #[test]
    fn priority_table() {
        let mut booth = Booth::new(BoothId::parse("01").unwrap(), 4, "9mx3m", "Foyer 1A");
        assert_eq!(classify(true, Some(1), Some(&booth)), HighlightClass::Selected);
        assert_eq!(classify(false, Some(4), Some(&booth)), HighlightClass::CategoryMatch(BoothStatus::Available));
        booth.status = BoothStatus::Reserved;
        assert_eq!(classify(false, Some(4), Some(&booth)), HighlightClass::CategoryMatch(BoothStatus::Reserved));
        assert_eq!(classify(false, Some(2), Some(&booth)), HighlightClass::Dimmed);
        assert_eq!(classify(false, None, Some(&booth)), HighlightClass::Plain);
        assert_eq!(classify(false, Some(2), None), HighlightClass::Plain);
        assert_eq!(classify(true, None, None), HighlightClass::Selected);
    }

    #[test]
    fn rebuild_replaces_previous_rects() {
        let (index, registry) = fixture();
        let mut layer = HighlightLayer::default();
        let selected: HashSet<_> = [BoothId::parse("06").unwrap()].into();
        layer.rebuild(&index, &registry, &selected, None, 12.0);
        layer.rebuild(&index, &registry, &selected, None, 12.0);
        assert_eq!(layer.rects().len(), 1);
        assert_eq!(layer.generation(), 2);

        let rect = &layer.rects()[0];
        assert_eq!(rect.fill, SELECTED_FILL);
        assert_eq!(rect.placement, Placement::AfterShape(0));
        assert_eq!(rect.rx, 4.0);

        layer.rebuild(&index, &registry, &HashSet::new(), None, 12.0);
        assert!(layer.rects().is_empty());
    }

    #[test]
    fn category_filter_colors_by_status_and_dims_others() {
        let (index, mut registry) = fixture();
        registry.mark_booked(&["32"]);
        let mut layer = HighlightLayer::default();
        layer.rebuild(&index, &registry, &HashSet::new(), Some(2), 12.0);

        assert_eq!(layer.rects().len(), 1);
        let rect = &layer.rects()[0];
        assert_eq!(rect.booth_id.as_str(), "32");
        assert_eq!(rect.fill, BOOKED_FILL);
        assert!(matches!(rect.placement, Placement::BeforeLabel(_)));
        assert_eq!(rect.rx, 6.0);

        // "06" (категория 1) приглушён, "99" нет в реестре - без стиля
        let styles: Vec<_> = layer.label_styles().iter().map(|(k, s)| (k.0, *s)).collect();
        assert_eq!(styles, vec![(0, LabelStyle::Dimmed), (1, LabelStyle::Emphasized)]);
    }
}
