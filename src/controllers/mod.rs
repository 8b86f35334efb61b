pub mod booths;
pub mod floorplan;
pub mod ws;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(booths::routes())
        .merge(floorplan::routes())
        .merge(ws::routes())
}
