use axum::{Json, extract::State};
use notechat_sdk::Provider;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModel {
    pub provider: Provider,
    pub default_model: String,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ProviderModel>,
}

/// Supported providers with their configured default model ids
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let data = Provider::ALL
        .iter()
        .map(|&provider| ProviderModel {
            provider,
            default_model: state.settings.providers.default_model(provider).to_string(),
        })
        .collect();

    Json(ModelList {
        object: "list",
        data,
    })
}
