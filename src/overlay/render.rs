//! Вклейка слоёв в исходный SVG.
//!
//! Исходник не парсится заново и не сериализуется: новые узлы вставляются
//! по байтовым позициям из индекса. Каждый вставленный узел помечен
//! атрибутом `data-booth-overlay`, поэтому `strip_overlay` возвращает
//! документ байт-в-байт.

use std::fmt::Write as _;

use super::highlight::{HighlightLayer, HighlightRect, LabelStyle, Placement, STROKE_WIDTH};
use super::InteractionLayer;
use crate::geometry::{GeometryError, GeometryIndex, Rect};

pub const OVERLAY_MARKER: &str = "data-booth-overlay";

const DIM_FILL: &str = "#ffffff";
const DIM_OPACITY: f64 = 0.6;

pub fn render_overlay(
    svg: &str,
    index: &GeometryIndex,
    highlights: &HighlightLayer,
    hitboxes: &InteractionLayer,
) -> String {
    // (позиция, порядок, фрагмент) - стабильная сортировка по позиции
    let mut inserts: Vec<(usize, usize, String)> = Vec::new();

    for rect in highlights.rects() {
        let at = match rect.placement {
            Placement::AfterShape(i) => index.shape(i).map(|s| s.range.end),
            Placement::BeforeLabel(key) => index.label(key).map(|l| l.range.start),
        };
        if let Some(at) = at {
            inserts.push((at, inserts.len(), highlight_node(rect)));
        }
    }

    for (key, style) in highlights.label_styles() {
        let Some(label) = index.label(*key) else { continue };
        if *style == LabelStyle::Dimmed {
            let mut node = String::new();
            let _ = write!(
                node,
                r#"<rect {OVERLAY_MARKER}="dim" data-booth-id="{}" {} fill="{DIM_FILL}" fill-opacity="{DIM_OPACITY}" pointer-events="none"{}/>"#,
                label.booth_id,
                rect_attrs(&label.text_box.inflate(2.0)),
                transform_attr(label.transform_attr.as_deref()),
            );
            inserts.push((label.range.end, inserts.len(), node));
        }
    }

    let mut group = format!(r#"<g {OVERLAY_MARKER}="hitboxes" class="booth-hitboxes">"#);
    for hitbox in hitboxes.hitboxes() {
        let matrix = (!hitbox.ctm.is_identity()).then(|| hitbox.ctm.to_svg());
        let _ = write!(
            group,
            r#"<rect {OVERLAY_MARKER}="hitbox" data-booth-id="{}" {} rx="6" ry="6" fill="transparent" stroke="none" style="cursor:pointer;pointer-events:all"{}/>"#,
            hitbox.booth_id,
            rect_attrs(&hitbox.rect),
            transform_attr(matrix.as_deref()),
        );
    }
    group.push_str("</g>");
    inserts.push((index.root_end(), inserts.len(), group));

    inserts.sort_by_key(|(at, order, _)| (*at, *order));
    let extra: usize = inserts.iter().map(|(_, _, s)| s.len()).sum();
    let mut out = String::with_capacity(svg.len() + extra);
    let mut cursor = 0;
    for (at, _, fragment) in inserts {
        let at = at.min(svg.len());
        out.push_str(&svg[cursor..at]);
        out.push_str(&fragment);
        cursor = at;
    }
    out.push_str(&svg[cursor..]);
    out
}

/// Удаляет все помеченные узлы (вместе с потомками).
pub fn strip_overlay(svg: &str) -> Result<String, GeometryError> {
    let opts = roxmltree::ParsingOptions { allow_dtd: true, ..Default::default() };
    let doc = roxmltree::Document::parse_with_options(svg, opts)?;
    let mut ranges: Vec<_> = doc
        .descendants()
        .filter(|n| n.has_attribute(OVERLAY_MARKER))
        .filter(|n| n.parent_element().map_or(true, |p| !p.has_attribute(OVERLAY_MARKER)))
        .map(|n| n.range())
        .collect();
    ranges.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(svg.len());
    let mut cursor = 0;
    for range in ranges {
        out.push_str(&svg[cursor..range.start]);
        cursor = range.end;
    }
    out.push_str(&svg[cursor..]);
    Ok(out)
}

fn highlight_node(rect: &HighlightRect) -> String {
    format!(
        r#"<rect {OVERLAY_MARKER}="highlight" data-booth-id="{}" class="booth-dynamic-highlight" {} rx="{}" ry="{}" fill="{}" stroke="{}" stroke-width="{STROKE_WIDTH}"{}/>"#,
        rect.booth_id,
        rect_attrs(&rect.rect),
        rect.rx,
        rect.ry,
        rect.fill,
        rect.stroke,
        transform_attr(rect.transform.as_deref()),
    )
}

fn rect_attrs(r: &Rect) -> String {
    format!(r#"x="{}" y="{}" width="{}" height="{}""#, r.x, r.y, r.width, r.height)
}

fn transform_attr(value: Option<&str>) -> String {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => format!(r#" transform="{}""#, escape_attr(v)),
        None => String::new(),
    }
}

fn escape_attr(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}
