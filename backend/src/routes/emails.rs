use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppResult, FieldErrors},
    extract::{AppJson, AppPath},
    models::{EmailLog, NewEmailLog},
    routes::{auth::looks_like_email, to_iso},
    schema::email_logs,
    state::AppState,
};

const MAX_SUBJECT_LEN: usize = 160;

#[derive(Serialize)]
pub struct EmailLogResponse {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent_at: String,
}

impl From<EmailLog> for EmailLogResponse {
    fn from(log: EmailLog) -> Self {
        Self {
            id: log.id,
            request_id: log.request_id,
            quote_id: log.quote_id,
            recipient: log.recipient,
            subject: log.subject,
            body: log.body,
            sent_at: to_iso(log.sent_at),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateEmailLogRequest {
    pub request_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

pub async fn list_email_logs(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<EmailLogResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<EmailLog> = email_logs::table
        .order(email_logs::sent_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(EmailLogResponse::from).collect()))
}

/// Records a message as sent. Delivery itself happens outside this service.
pub async fn create_email_log(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppJson(payload): AppJson<CreateEmailLogRequest>,
) -> AppResult<(StatusCode, Json<EmailLogResponse>)> {
    let recipient = payload.recipient.trim().to_lowercase();
    let mut errors = FieldErrors::new();
    if !looks_like_email(&recipient) {
        errors.add("recipient", "must be a valid email address");
    }
    errors.max_len("recipient", recipient.as_str(), 160);
    errors.require_text("subject", &payload.subject);
    errors.max_len("subject", payload.subject.as_str(), MAX_SUBJECT_LEN);
    errors.require_text("body", &payload.body);
    errors.finish()?;

    let mut conn = state.db()?;
    let log: EmailLog = diesel::insert_into(email_logs::table)
        .values(NewEmailLog {
            id: Uuid::new_v4(),
            request_id: payload.request_id,
            quote_id: payload.quote_id,
            recipient,
            subject: payload.subject.trim().to_string(),
            body: payload.body,
        })
        .get_result(&mut conn)?;

    tracing::info!(email_id = %log.id, recipient = %log.recipient, "email logged");
    Ok((StatusCode::CREATED, Json(log.into())))
}

pub async fn list_by_recipient(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(recipient): AppPath<String>,
) -> AppResult<Json<Vec<EmailLogResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<EmailLog> = email_logs::table
        .filter(email_logs::recipient.eq(recipient.trim().to_lowercase()))
        .order(email_logs::sent_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(EmailLogResponse::from).collect()))
}
