//! `messages/*` handlers

use super::{require_key, MandrillJson};
use crate::domain::{
    CancelResult, IdRequest, KeyRequest, ListScheduledRequest, MessageContent, MessageRecord,
    ParseRequest, ParsedRawMessage, RescheduleRequest, SearchRequest, SendRawRequest, SendRequest,
    SendResult, SendTemplateRequest, TimeSeriesPoint,
};
use crate::error::Result;
use crate::server::AppState;
use axum::{extract::State, Json};

pub async fn send(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<SendRequest>,
) -> Result<Json<Vec<SendResult>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let results = state.message_service.send(input).await?;
    Ok(Json(results))
}

pub async fn send_template(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<SendTemplateRequest>,
) -> Result<Json<Vec<SendResult>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let results = state.message_service.send_template(input).await?;
    Ok(Json(results))
}

pub async fn send_raw(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<SendRawRequest>,
) -> Result<Json<Vec<SendResult>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let results = state.message_service.send_raw(input).await?;
    Ok(Json(results))
}

/// Parsing has no side effects, so it skips the key check
pub async fn parse(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<ParseRequest>,
) -> Result<Json<ParsedRawMessage>> {
    let parsed = state.message_service.parse(&input.raw_message)?;
    Ok(Json(parsed))
}

pub async fn info(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<IdRequest>,
) -> Result<Json<MessageRecord>> {
    require_key(&state.config.api_keys, &input.key)?;
    let record = state.message_service.info(input).await?;
    Ok(Json(record))
}

pub async fn content(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<IdRequest>,
) -> Result<Json<MessageContent>> {
    require_key(&state.config.api_keys, &input.key)?;
    let content = state.message_service.content(input).await?;
    Ok(Json(content))
}

pub async fn search(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<SearchRequest>,
) -> Result<Json<Vec<MessageRecord>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let records = state.message_service.search(input).await?;
    Ok(Json(records))
}

pub async fn search_time_series(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<KeyRequest>,
) -> Result<Json<Vec<TimeSeriesPoint>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let series = state.message_service.search_time_series().await?;
    Ok(Json(series))
}

pub async fn list_scheduled(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<ListScheduledRequest>,
) -> Result<Json<Vec<MessageRecord>>> {
    require_key(&state.config.api_keys, &input.key)?;
    let records = state.message_service.list_scheduled(input).await?;
    Ok(Json(records))
}

pub async fn cancel_scheduled(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<IdRequest>,
) -> Result<Json<CancelResult>> {
    require_key(&state.config.api_keys, &input.key)?;
    let result = state.message_service.cancel_scheduled(input).await?;
    Ok(Json(result))
}

pub async fn reschedule(
    State(state): State<AppState>,
    MandrillJson(input): MandrillJson<RescheduleRequest>,
) -> Result<Json<MessageRecord>> {
    require_key(&state.config.api_keys, &input.key)?;
    let record = state.message_service.reschedule(input).await?;
    Ok(Json(record))
}
