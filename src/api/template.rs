//! `templates/*` handlers

use super::{require_key, MandrillJson};
use crate::domain::{
    RenderedTemplate, Template, TemplateAddRequest, TemplateListRequest, TemplateNameRequest,
    TemplateRenderRequest, TemplateUpdateRequest, TimeSeriesPoint,
};
use crate::error::Result;
use crate::server::AppState;
use axum::{extract::State, Json};

pub async fn add(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateAddRequest>,
) -> Result<Json<Template>> {
    require_key(&state.config.api_keys, &input.key)?;
    let template = state.template_service.add(input).await?;
    Ok(Json(template))
}

pub async fn info(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateNameRequest>,
) -> Result<Json<Template>> {
    require_key(&state.config.api_keys, &input.key)?;
    let template = state.template_service.info(&input.name).await?;
    Ok(Json(template))
}

pub async fn update(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateUpdateRequest>,
) -> Result<Json<Template>> {
    require_key(&state.config.api_keys, &input.key)?;
    let template = state.template_service.update(input).await?;
    Ok(Json(template))
}

pub async fn publish(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateNameRequest>,
) -> Result<Json<Template>> {
    require_key(&state.config.api_keys, &input.key)?;
    let template = state.template_service.publish(&input.name).await?;
    Ok(Json(template))
}

pub async fn delete(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateNameRequest>,
) -> Result<Json<Template>> {
    require_key(&state.config.api_keys, &input.key)?;
    let template = state.template_service.delete(&input.name).await?;
    Ok(Json(template))
}

pub async fn list(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateListRequest>,
) -> Result<Json<Vec<Template>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let templates = state.template_service.list(&input.label).await?;
    Ok(Json(templates))
}

pub async fn time_series(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateNameRequest>,
) -> Result<Json<Vec<TimeSeriesPoint>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let series = state.template_service.time_series(&input.name).await?;
    Ok(Json(series))
}

pub async fn render(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<TemplateRenderRequest>,
) -> Result<Json<RenderedTemplate>> {
    require_key(&state.config.api_keys, &input.key)?;
    let rendered = state.template_service.render(input).await?;
    Ok(Json(rendered))
}
