use axum::{http::StatusCode, response::IntoResponse};

// Undocumented landing route; health and the v1 surface carry the real data.
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
    )
}
