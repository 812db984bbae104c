//! Prometheus 指标端点

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::presentation::routes::AppState;
use crate::shared::AppResult;

pub async fn render_metrics(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = app_state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
