use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::AppError;
use crate::geometry::{Bounds, LabelKey, Point, Rect};
use crate::models::BoothId;
use crate::overlay::{render_overlay, HighlightLayer};
use crate::AppState;

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/floorplan/map.svg", get(map_svg))
        .route("/floorplan/geometry", get(geometry))
        .route("/floorplan/overlay.svg", get(overlay_svg))
}

pub async fn map_svg(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], state.svg.to_string())
}

#[derive(Debug, Serialize)]
pub struct LabelEntry {
    pub key: LabelKey,
    pub booth_id: BoothId,
    pub anchor: Point,
    pub bounds: Bounds,
    /// `true`, если фигура не нашлась и границы взяты из бокса текста.
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct GeometryResponse {
    pub view_box: Option<Rect>,
    pub labels: Vec<LabelEntry>,
    pub resolved: usize,
    pub hitboxes: usize,
}

pub async fn geometry(State(state): State<Arc<AppState>>) -> Json<GeometryResponse> {
    let padding = state.config.map.highlight_padding;
    let labels = state
        .index
        .labels()
        .iter()
        .map(|label| LabelEntry {
            key: label.key,
            booth_id: label.booth_id.clone(),
            anchor: label.anchor,
            bounds: state.index.label_bounds(label, padding),
            fallback: !label.is_resolved(),
        })
        .collect();
    Json(GeometryResponse {
        view_box: state.index.view_box(),
        labels,
        resolved: state.index.resolved_count(),
        hitboxes: state.hitboxes.len(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct OverlayQuery {
    /// Номера через запятую: `06,07`.
    pub selected: Option<String>,
    pub category: Option<u8>,
}

/// Карта со вклеенными слоями для заданного выбора, без состояния на сервере.
pub async fn overlay_svg(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OverlayQuery>,
) -> Result<impl IntoResponse, AppError> {
    let selected = params
        .selected
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| BoothId::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid booth id: {raw}"))))
        .collect::<Result<HashSet<_>, _>>()?;

    let mut layer = HighlightLayer::default();
    {
        let registry = state.registry.read();
        layer.rebuild(&state.index, &registry, &selected, params.category, state.config.map.highlight_padding);
    }
    let svg = render_overlay(&state.svg, &state.index, &layer, &state.hitboxes);
    Ok(([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], svg))
}
