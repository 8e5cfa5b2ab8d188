//! Append-only audit ledger.
//!
//! Entries are only ever inserted. Nothing in the crate updates or deletes a
//! row of `history_entries`.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{EntityType, Status},
    models::{HistoryEntry, NewHistoryEntry},
    schema::history_entries,
};

pub const ACTION_CREATED: &str = "CREADO";
pub const ACTION_UPDATED: &str = "ACTUALIZADO";
pub const ACTION_STATUS_CHANGED: &str = "ESTADO_CAMBIADO";
pub const ACTION_ASSIGNED: &str = "ASIGNADO";
pub const ACTION_DELETED: &str = "ELIMINADO";
pub const ACTION_REUSED: &str = "REUTILIZADA";
pub const ACTION_MARGIN_UPDATED: &str = "MARGEN_ACTUALIZADO";
pub const ACTION_APPROVED: &str = "APROBADO";
pub const ACTION_REJECTED: &str = "RECHAZADO";
pub const ACTION_ROLE_CHANGED: &str = "ROL_CAMBIADO";

pub fn record(
    conn: &mut PgConnection,
    entity_type: EntityType,
    entity_id: Uuid,
    action: &str,
    detail: Option<String>,
    actor_id: Uuid,
) -> QueryResult<HistoryEntry> {
    diesel::insert_into(history_entries::table)
        .values(NewHistoryEntry {
            id: Uuid::new_v4(),
            entity_type: entity_type.as_str().to_string(),
            entity_id,
            action: action.to_string(),
            detail,
            actor_id,
        })
        .get_result(conn)
}

pub fn status_change_detail(previous: Status, next: Status) -> String {
    json!({
        "estado_anterior": previous.as_str(),
        "estado_nuevo": next.as_str(),
    })
    .to_string()
}

/// Entries for one entity, oldest first.
pub fn list_for_entity(
    conn: &mut PgConnection,
    entity_type: EntityType,
    entity_id: Uuid,
) -> QueryResult<Vec<HistoryEntry>> {
    history_entries::table
        .filter(history_entries::entity_type.eq(entity_type.as_str()))
        .filter(history_entries::entity_id.eq(entity_id))
        .order((history_entries::created_at.asc(), history_entries::id.asc()))
        .load(conn)
}

pub fn list_page(conn: &mut PgConnection, limit: i64, offset: i64) -> QueryResult<Vec<HistoryEntry>> {
    history_entries::table
        .order((history_entries::created_at.desc(), history_entries::id.desc()))
        .limit(limit)
        .offset(offset)
        .load(conn)
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

/// Entries matching every supplied criterion, newest first.
pub fn list_filtered(
    conn: &mut PgConnection,
    filter: &HistoryFilter,
) -> QueryResult<Vec<HistoryEntry>> {
    let mut query = history_entries::table.into_boxed();
    if let Some(entity_type) = filter.entity_type {
        query = query.filter(history_entries::entity_type.eq(entity_type.as_str()));
    }
    if let Some(entity_id) = filter.entity_id {
        query = query.filter(history_entries::entity_id.eq(entity_id));
    }
    if let Some(action) = filter.action.as_deref() {
        query = query.filter(history_entries::action.eq(action.trim().to_ascii_uppercase()));
    }
    if let Some(from) = filter.from {
        query = query.filter(history_entries::created_at.ge(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(history_entries::created_at.le(to));
    }
    query
        .order((history_entries::created_at.desc(), history_entries::id.desc()))
        .load(conn)
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary<T> {
    pub total: usize,
    pub counts_by_action: BTreeMap<String, usize>,
    pub first: Option<T>,
    pub last: Option<T>,
}

/// Summarises entries that are already in chronological order.
pub fn summarize<T: Clone>(entries: &[T], action_of: impl Fn(&T) -> &str) -> HistorySummary<T> {
    let mut counts_by_action = BTreeMap::new();
    for entry in entries {
        *counts_by_action
            .entry(action_of(entry).to_string())
            .or_insert(0) += 1;
    }
    HistorySummary {
        total: entries.len(),
        counts_by_action,
        first: entries.first().cloned(),
        last: entries.last().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_detail_names_both_states() {
        let detail: serde_json::Value =
            serde_json::from_str(&status_change_detail(Status::Pendiente, Status::Enviado))
                .unwrap();
        assert_eq!(detail["estado_anterior"], "PENDIENTE");
        assert_eq!(detail["estado_nuevo"], "ENVIADO");
    }

    #[test]
    fn summary_counts_actions_and_keeps_ends() {
        let entries = vec![
            ("a", ACTION_CREATED),
            ("b", ACTION_UPDATED),
            ("c", ACTION_STATUS_CHANGED),
            ("d", ACTION_STATUS_CHANGED),
        ];
        let summary = summarize(&entries, |entry| entry.1);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.counts_by_action[ACTION_STATUS_CHANGED], 2);
        assert_eq!(summary.counts_by_action[ACTION_CREATED], 1);
        assert_eq!(summary.first.map(|e| e.0), Some("a"));
        assert_eq!(summary.last.map(|e| e.0), Some("d"));
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = summarize::<(&str, &str)>(&[], |entry| entry.1);
        assert_eq!(summary.total, 0);
        assert!(summary.counts_by_action.is_empty());
        assert!(summary.first.is_none());
    }
}
