//! HTTP surface: thin axum routes over [`ForecastService`].

pub mod dto;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::data::{PriceFeed, PriceRepository};
use crate::service::ForecastService;

/// `/predict` at the root; the `/stocks` routes under `base_route` (empty for
/// the root)
pub fn router<R, F>(service: Arc<ForecastService<R, F>>, base_route: &str) -> Router
where
    R: PriceRepository + 'static,
    F: PriceFeed + 'static,
{
    let stocks = Router::new()
        .route("/stocks/train", post(handlers::train::<R, F>))
        .route("/stocks/data", post(handlers::save_stock_data::<R, F>))
        .route("/stocks/:identifier", get(handlers::get_stock_price::<R, F>))
        .with_state(service.clone());

    let base_route = base_route.trim_end_matches('/');
    let app = Router::new()
        .route("/predict", post(handlers::predict::<R, F>))
        .with_state(service);

    if base_route.is_empty() {
        app.merge(stocks)
    } else if base_route.starts_with('/') {
        app.nest(base_route, stocks)
    } else {
        app.nest(&format!("/{}", base_route), stocks)
    }
}
