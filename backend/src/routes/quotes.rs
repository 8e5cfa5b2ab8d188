use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Days, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{self, AuthenticatedUser},
    domain::{EntityType, Status, TransportMode},
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath, AppQuery},
    history,
    models::{NewQuote, Provider, Quote, ShipmentRequest},
    pricing::{self, MarginBreakdown, MarginInput, QuoteComparison},
    routes::{history::present_entries, history::HistoryEntryResponse, normalize_optional, to_iso},
    schema::{providers, quotes, shipment_requests},
    state::AppState,
    suggestions::{self, QuoteSuggestion},
    workflow,
};

const REUSED_VALIDITY_DAYS: u64 = 30;

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub request_folio: Option<String>,
    pub provider_id: Uuid,
    pub provider_name: Option<String>,
    pub transport_mode: String,
    pub origin: String,
    pub destination: String,
    pub unit_type: Option<String>,
    pub estimated_time: Option<String>,
    pub cost: f64,
    pub valid_until: Option<NaiveDate>,
    pub credit_days: Option<i32>,
    pub margin_pct: Option<f64>,
    pub status: String,
    pub created_at: String,
}

/// Commercial terms shared by create and update.
#[derive(Debug, Deserialize)]
pub struct QuoteTerms {
    pub provider_id: Uuid,
    pub transport_mode: TransportMode,
    pub origin: String,
    pub destination: String,
    pub unit_type: Option<String>,
    pub estimated_time: Option<String>,
    pub cost: f64,
    pub valid_until: Option<NaiveDate>,
    pub credit_days: Option<i32>,
    pub margin_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotePayload {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub terms: QuoteTerms,
}

#[derive(AsChangeset)]
#[diesel(table_name = quotes, treat_none_as_null = true)]
struct QuoteChangeset {
    provider_id: Uuid,
    transport_mode: String,
    origin: String,
    destination: String,
    unit_type: Option<String>,
    estimated_time: Option<String>,
    cost: f64,
    valid_until: Option<NaiveDate>,
    credit_days: Option<i32>,
    margin_pct: Option<f64>,
}

impl QuoteTerms {
    fn into_changeset(self) -> AppResult<QuoteChangeset> {
        let mut errors = FieldErrors::new();
        errors.require_text("origin", &self.origin);
        errors.require_text("destination", &self.destination);
        errors.max_len("origin", self.origin.as_str(), 160);
        errors.max_len("destination", self.destination.as_str(), 160);
        errors.max_len("unit_type", self.unit_type.as_deref(), 120);
        errors.max_len("estimated_time", self.estimated_time.as_deref(), 80);
        if !(self.cost.is_finite() && self.cost > 0.0) {
            errors.add("cost", "must be greater than 0");
        }
        if matches!(self.credit_days, Some(days) if days < 0) {
            errors.add("credit_days", "must not be negative");
        }
        if let Some(margin) = self.margin_pct {
            if pricing::validate_applied_margin(margin).is_err() {
                errors.add("margin_pct", "must be between 0 and 100");
            }
        }
        errors.finish()?;

        Ok(QuoteChangeset {
            provider_id: self.provider_id,
            transport_mode: self.transport_mode.as_str().to_string(),
            origin: self.origin.trim().to_string(),
            destination: self.destination.trim().to_string(),
            unit_type: normalize_optional(self.unit_type.as_deref()),
            estimated_time: normalize_optional(self.estimated_time.as_deref()),
            cost: self.cost,
            valid_until: self.valid_until,
            credit_days: self.credit_days,
            margin_pct: self.margin_pct,
        })
    }
}

#[derive(Deserialize)]
pub struct SuggestionQuery {
    pub solicitud_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReuseQuery {
    pub nueva_solicitud_id: Uuid,
    pub nuevo_costo: Option<f64>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub estado: Status,
}

#[derive(Deserialize)]
pub struct MarginCalculatorRequest {
    pub provider_cost: f64,
    pub extra_costs: Option<f64>,
    pub margin_pct: Option<f64>,
    pub solicitud_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ApplyMarginRequest {
    pub margin_pct: f64,
}

pub(crate) fn present_quotes(
    conn: &mut PgConnection,
    rows: Vec<Quote>,
) -> AppResult<Vec<QuoteResponse>> {
    let request_ids: Vec<Uuid> = rows.iter().map(|q| q.request_id).collect();
    let provider_ids: Vec<Uuid> = rows.iter().map(|q| q.provider_id).collect();

    let folios: HashMap<Uuid, String> = shipment_requests::table
        .filter(shipment_requests::id.eq_any(request_ids))
        .select((shipment_requests::id, shipment_requests::folio))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();
    let provider_names: HashMap<Uuid, String> = providers::table
        .filter(providers::id.eq_any(provider_ids))
        .select((providers::id, providers::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    Ok(rows
        .into_iter()
        .map(|q| QuoteResponse {
            request_folio: folios.get(&q.request_id).cloned(),
            provider_name: provider_names.get(&q.provider_id).cloned(),
            id: q.id,
            request_id: q.request_id,
            provider_id: q.provider_id,
            transport_mode: q.transport_mode,
            origin: q.origin,
            destination: q.destination,
            unit_type: q.unit_type,
            estimated_time: q.estimated_time,
            cost: q.cost,
            valid_until: q.valid_until,
            credit_days: q.credit_days,
            margin_pct: q.margin_pct,
            status: q.status,
            created_at: to_iso(q.created_at),
        })
        .collect())
}

fn present_one(conn: &mut PgConnection, quote: Quote) -> AppResult<QuoteResponse> {
    present_quotes(conn, vec![quote])?
        .pop()
        .ok_or_else(|| AppError::internal("quote vanished while presenting"))
}

fn find_request(conn: &mut PgConnection, request_id: Uuid) -> AppResult<ShipmentRequest> {
    shipment_requests::table
        .find(request_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("shipment request not found"))
}

fn find_quote(conn: &mut PgConnection, quote_id: Uuid) -> AppResult<Quote> {
    quotes::table
        .find(quote_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("quote not found"))
}

fn ensure_provider(conn: &mut PgConnection, provider_id: Uuid) -> AppResult<()> {
    providers::table
        .find(provider_id)
        .select(providers::id)
        .first::<Uuid>(conn)
        .optional()?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found_with("provider not found"))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<QuoteResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let rows: Vec<Quote> = quotes::table
        .order(quotes::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(present_quotes(&mut conn, rows)?))
}

pub async fn create_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<CreateQuotePayload>,
) -> AppResult<(StatusCode, Json<QuoteResponse>)> {
    user.require_role(auth::PRICING)?;
    let request_id = payload.request_id;
    let terms = payload.terms.into_changeset()?;

    let mut conn = state.db()?;
    let created = conn.transaction::<_, AppError, _>(|conn| {
        let request = find_request(conn, request_id)?;
        ensure_provider(conn, terms.provider_id)?;

        let quote: Quote = diesel::insert_into(quotes::table)
            .values(NewQuote {
                id: Uuid::new_v4(),
                request_id: request.id,
                provider_id: terms.provider_id,
                transport_mode: terms.transport_mode,
                origin: terms.origin,
                destination: terms.destination,
                unit_type: terms.unit_type,
                estimated_time: terms.estimated_time,
                cost: terms.cost,
                valid_until: terms.valid_until,
                credit_days: terms.credit_days,
                margin_pct: terms.margin_pct,
                status: Status::Pendiente.as_str().to_string(),
            })
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Cotizacion,
            quote.id,
            history::ACTION_CREATED,
            Some(format!("Quote created for request {}", request.folio)),
            user.employee_id,
        )?;
        Ok(quote)
    })?;

    tracing::info!(quote_id = %created.id, request_id = %created.request_id, "quote created");
    Ok((StatusCode::CREATED, Json(present_one(&mut conn, created)?)))
}

pub async fn list_by_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<QuoteResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let rows: Vec<Quote> = quotes::table
        .filter(quotes::request_id.eq(request_id))
        .order(quotes::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(present_quotes(&mut conn, rows)?))
}

pub async fn suggestions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppQuery(query): AppQuery<SuggestionQuery>,
) -> AppResult<Json<Vec<QuoteSuggestion>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let target = find_request(&mut conn, query.solicitud_id)?;
    let ranked = suggestions::suggest_for_request(&mut conn, &target, &state.config.suggestions)?;
    Ok(Json(ranked))
}

pub async fn update_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
    AppJson(payload): AppJson<QuoteTerms>,
) -> AppResult<Json<QuoteResponse>> {
    user.require_role(auth::PRICING)?;
    let changeset = payload.into_changeset()?;

    let mut conn = state.db()?;
    let updated = conn.transaction::<_, AppError, _>(|conn| {
        ensure_provider(conn, changeset.provider_id)?;
        let updated: Quote = diesel::update(quotes::table.find(quote_id))
            .set(&changeset)
            .get_result(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("quote not found"))?;
        history::record(
            conn,
            EntityType::Cotizacion,
            updated.id,
            history::ACTION_UPDATED,
            Some("Quote terms updated".to_string()),
            user.employee_id,
        )?;
        Ok(updated)
    })?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    user.require_role(auth::PRICING_OR_ADMIN)?;
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let deleted = diesel::delete(quotes::table.find(quote_id)).execute(conn)?;
        if deleted == 0 {
            return Err(AppError::not_found_with("quote not found"));
        }
        history::record(
            conn,
            EntityType::Cotizacion,
            quote_id,
            history::ACTION_DELETED,
            None,
            user.employee_id,
        )?;
        Ok(())
    })?;
    tracing::info!(quote_id = %quote_id, "quote deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Copies an existing quote onto another request as a fresh `PENDIENTE` quote.
pub async fn reuse_quote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<ReuseQuery>,
) -> AppResult<(StatusCode, Json<QuoteResponse>)> {
    user.require_role(auth::ANY_ROLE)?;
    if let Some(cost) = query.nuevo_costo {
        if !(cost.is_finite() && cost > 0.0) {
            let mut errors = FieldErrors::new();
            errors.add("nuevo_costo", "must be greater than 0");
            errors.finish()?;
        }
    }

    let today = Utc::now().date_naive();
    let valid_until = today
        .checked_add_days(Days::new(REUSED_VALIDITY_DAYS))
        .ok_or_else(|| AppError::internal("validity date out of range"))?;

    let mut conn = state.db()?;
    let created = conn.transaction::<_, AppError, _>(|conn| {
        let original = find_quote(conn, quote_id)?;
        let request = find_request(conn, query.nueva_solicitud_id)?;

        let quote: Quote = diesel::insert_into(quotes::table)
            .values(NewQuote {
                id: Uuid::new_v4(),
                request_id: request.id,
                provider_id: original.provider_id,
                transport_mode: original.transport_mode.clone(),
                origin: original.origin.clone(),
                destination: original.destination.clone(),
                unit_type: original.unit_type.clone(),
                estimated_time: original.estimated_time.clone(),
                cost: query.nuevo_costo.unwrap_or(original.cost),
                valid_until: Some(valid_until),
                credit_days: original.credit_days,
                margin_pct: original.margin_pct,
                status: Status::Pendiente.as_str().to_string(),
            })
            .get_result(conn)?;

        history::record(
            conn,
            EntityType::Cotizacion,
            quote.id,
            history::ACTION_CREATED,
            Some(format!("Quote created for request {}", request.folio)),
            user.employee_id,
        )?;
        history::record(
            conn,
            EntityType::Cotizacion,
            quote.id,
            history::ACTION_REUSED,
            Some(
                json!({
                    "cotizacion_origen": original.id,
                    "costo_ajustado": query.nuevo_costo.is_some(),
                })
                .to_string(),
            ),
            user.employee_id,
        )?;
        Ok(quote)
    })?;

    tracing::info!(
        quote_id = %created.id,
        source_quote_id = %quote_id,
        request_id = %created.request_id,
        "quote reused"
    );
    Ok((StatusCode::CREATED, Json(present_one(&mut conn, created)?)))
}

pub async fn change_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<StatusQuery>,
) -> AppResult<Json<QuoteResponse>> {
    user.require_role(auth::PRICING)?;
    let mut conn = state.db()?;
    let updated = workflow::change_quote_status(&mut conn, quote_id, query.estado, user.employee_id)?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn quote_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let entries = history::list_for_entity(&mut conn, EntityType::Cotizacion, quote_id)?;
    Ok(Json(present_entries(&mut conn, entries)?))
}

pub async fn calculate_margin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<MarginCalculatorRequest>,
) -> AppResult<Json<MarginBreakdown>> {
    user.require_role(auth::ANY_ROLE)?;
    let market = match payload.solicitud_id {
        Some(request_id) => {
            let mut conn = state.db()?;
            let costs: Vec<f64> = quotes::table
                .filter(quotes::request_id.eq(request_id))
                .select(quotes::cost)
                .load(&mut conn)?;
            pricing::market_prices(costs)
        }
        None => None,
    };

    let breakdown = pricing::calculate_margin(
        &MarginInput {
            provider_cost: payload.provider_cost,
            extra_costs: payload.extra_costs,
            margin_pct: payload.margin_pct,
        },
        market.as_ref(),
    )?;
    Ok(Json(breakdown))
}

pub async fn apply_margin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(quote_id): AppPath<Uuid>,
    AppJson(payload): AppJson<ApplyMarginRequest>,
) -> AppResult<Json<QuoteResponse>> {
    user.require_role(auth::PRICING)?;
    let margin_pct = pricing::validate_applied_margin(payload.margin_pct)?;

    let mut conn = state.db()?;
    let updated = conn.transaction::<_, AppError, _>(|conn| {
        let previous = find_quote(conn, quote_id)?;
        let updated: Quote = diesel::update(quotes::table.find(quote_id))
            .set(quotes::margin_pct.eq(Some(margin_pct)))
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Cotizacion,
            quote_id,
            history::ACTION_MARGIN_UPDATED,
            Some(
                json!({
                    "margen_anterior": previous.margin_pct,
                    "margen_nuevo": margin_pct,
                })
                .to_string(),
            ),
            user.employee_id,
        )?;
        Ok(updated)
    })?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn compare(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<QuoteComparison>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let request = find_request(&mut conn, request_id)?;
    let rows: Vec<(Quote, Provider)> = quotes::table
        .inner_join(providers::table)
        .filter(quotes::request_id.eq(request_id))
        .order(quotes::created_at.asc())
        .select((quotes::all_columns, providers::all_columns))
        .load(&mut conn)?;
    let today = Utc::now().date_naive();
    Ok(Json(pricing::compare_quotes(&request.folio, &rows, today)))
}
