use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        message: "Notechat API is running",
    })
}
