//! # Label Commands
//!
//! Languages and the display labels shown on screens and receipts.
//! A lookup falls back from the requested language to the default one and
//! finally to the key itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tillstone_core::{Label, Language};
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLanguageRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLabelRequest {
    pub language: String,
    pub key: String,
    pub text: String,
}

/// Every label of a language after fallback, keyed in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSetResponse {
    pub language: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    pub inserted: u64,
}

pub async fn list_languages(state: &AppState) -> ApiResult<Vec<Language>> {
    Ok(state.database().labels().languages().await?)
}

pub async fn add_language(state: &AppState, request: AddLanguageRequest) -> ApiResult<Language> {
    debug!(code = %request.code, "add_language command");
    Ok(state
        .database()
        .labels()
        .add_language(&request.code, &request.name)
        .await?)
}

pub async fn set_default_language(state: &AppState, code: &str) -> ApiResult<Vec<Language>> {
    debug!(code = %code, "set_default_language command");
    let labels = state.database().labels();
    labels.set_default_language(code).await?;
    Ok(labels.languages().await?)
}

/// Labels stored for one language, without fallback.
pub async fn list_labels(state: &AppState, language: &str) -> ApiResult<Vec<Label>> {
    Ok(state.database().labels().labels(language).await?)
}

pub async fn set_label(state: &AppState, request: SetLabelRequest) -> ApiResult<Label> {
    debug!(language = %request.language, key = %request.key, "set_label command");
    Ok(state
        .database()
        .labels()
        .upsert_label(&request.language, &request.key, &request.text)
        .await?)
}

/// Resolved labels for a language; the configured default when omitted.
pub async fn label_set(state: &AppState, language: Option<&str>) -> ApiResult<LabelSetResponse> {
    let language = language.unwrap_or(&state.config.default_language);
    let set = state.database().labels().load_set(language).await?;
    Ok(LabelSetResponse {
        language: set.language.clone(),
        labels: set.resolved().into_iter().collect(),
    })
}

/// Loads the compiled-in dictionaries without overwriting edited labels.
pub async fn seed_labels(state: &AppState) -> ApiResult<SeedResponse> {
    let inserted = state.database().labels().seed_builtin().await?;
    info!(inserted, "Built-in labels seeded");
    Ok(SeedResponse { inserted })
}
