use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{self, AuthenticatedUser},
    domain::EntityType,
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath, AppQuery},
    history::{self, HistoryFilter, HistorySummary},
    models::HistoryEntry,
    routes::to_iso,
    schema::employees,
    state::AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;
const MAX_ACTION_LEN: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub actor_id: Uuid,
    pub actor_name: Option<String>,
    pub created_at: String,
}

/// Attaches actor names to entries, preserving their order.
pub(crate) fn present_entries(
    conn: &mut PgConnection,
    entries: Vec<HistoryEntry>,
) -> AppResult<Vec<HistoryEntryResponse>> {
    let mut actor_ids: Vec<Uuid> = entries.iter().map(|entry| entry.actor_id).collect();
    actor_ids.sort_unstable();
    actor_ids.dedup();

    let names: HashMap<Uuid, String> = employees::table
        .filter(employees::id.eq_any(actor_ids))
        .select((employees::id, employees::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    Ok(entries
        .into_iter()
        .map(|entry| HistoryEntryResponse {
            actor_name: names.get(&entry.actor_id).cloned(),
            id: entry.id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            detail: entry.detail,
            actor_id: entry.actor_id,
            created_at: to_iso(entry.created_at),
        })
        .collect())
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateHistoryRequest {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Deserialize)]
pub struct FilterQuery {
    pub tipo: Option<EntityType>,
    pub entidad_id: Option<Uuid>,
    pub accion: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
}

pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut conn = state.db()?;
    let entries = history::list_page(&mut conn, limit, offset)?;
    Ok(Json(present_entries(&mut conn, entries)?))
}

pub async fn create_history_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<CreateHistoryRequest>,
) -> AppResult<(StatusCode, Json<HistoryEntryResponse>)> {
    user.require_role(auth::ANY_ROLE)?;
    let mut errors = FieldErrors::new();
    errors.require_text("action", &payload.action);
    errors.max_len("action", payload.action.as_str(), MAX_ACTION_LEN);
    errors.finish()?;

    let mut conn = state.db()?;
    let entry = history::record(
        &mut conn,
        payload.entity_type,
        payload.entity_id,
        &payload.action.trim().to_ascii_uppercase(),
        payload.detail,
        user.employee_id,
    )?;
    let mut presented = present_entries(&mut conn, vec![entry])?;
    let entry = presented.pop().ok_or_else(|| AppError::internal("history entry vanished"))?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_for_entity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath((entity_type, entity_id)): AppPath<(EntityType, Uuid)>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let entries = history::list_for_entity(&mut conn, entity_type, entity_id)?;
    Ok(Json(present_entries(&mut conn, entries)?))
}

pub async fn list_filtered(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppQuery(query): AppQuery<FilterQuery>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut errors = FieldErrors::new();
    let from = parse_bound(query.desde.as_deref(), Bound::Start, "desde", &mut errors);
    let to = parse_bound(query.hasta.as_deref(), Bound::End, "hasta", &mut errors);
    errors.finish()?;

    let filter = HistoryFilter {
        entity_type: query.tipo,
        entity_id: query.entidad_id,
        action: query.accion.filter(|a| !a.trim().is_empty()),
        from,
        to,
    };
    let mut conn = state.db()?;
    let entries = history::list_filtered(&mut conn, &filter)?;
    Ok(Json(present_entries(&mut conn, entries)?))
}

pub async fn summary_for_entity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath((entity_type, entity_id)): AppPath<(EntityType, Uuid)>,
) -> AppResult<Json<HistorySummary<HistoryEntryResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let entries = history::list_for_entity(&mut conn, entity_type, entity_id)?;
    let presented = present_entries(&mut conn, entries)?;
    Ok(Json(history::summarize(&presented, |entry| entry.action.as_str())))
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` values or plain
/// dates. A plain date covers the whole day on either side of the range.
fn parse_bound(
    raw: Option<&str>,
    bound: Bound,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::from_hms_opt(0, 0, 0)?,
            Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)?,
        };
        return Some(date.and_time(time));
    }
    errors.add(field, "must be a date (YYYY-MM-DD) or an ISO-8601 timestamp");
    None
}
