use axum::{routing::get, Router};

use crate::api::{handlers, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/common-fee/aging", get(handlers::aging_handler))
        .route("/api/common-fee/sites", get(handlers::sites_handler))
        .route("/api/common-fee/years", get(handlers::years_handler))
        .route("/api/sales-2025/vp", get(handlers::vp_rollups_handler))
        .route("/api/sales-2025/vp/:name", get(handlers::vp_detail_handler))
        .route("/api/sales-2025/mgr", get(handlers::mgr_rollups_handler))
        .route("/api/sales-2025/mgr/:name", get(handlers::mgr_detail_handler))
        .route("/api/sales-2025/bud", get(handlers::bud_rollups_handler))
        .route("/api/sales-mkt/channels", get(handlers::channels_handler))
        .route(
            "/api/settings",
            get(handlers::get_settings_handler).put(handlers::put_settings_handler),
        )
}
