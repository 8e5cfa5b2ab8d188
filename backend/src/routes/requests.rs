use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Datelike, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{self, AuthenticatedUser},
    domain::{EntityType, ServiceType, Status},
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath, AppQuery},
    folio, history,
    models::{Employee, NewShipmentRequest, Quote, ShipmentRequest},
    routes::{history::present_entries, history::HistoryEntryResponse, normalize_optional, to_iso},
    schema::{clients, employees, providers, quotes, shipment_requests},
    state::AppState,
    workflow,
};

const DEFAULT_RECENT_LIMIT: i64 = 20;
const MAX_RECENT_LIMIT: i64 = 200;

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub id: Uuid,
    pub folio: String,
    pub company_code: String,
    pub issue_date: NaiveDate,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub service_type: String,
    pub origin_country: Option<String>,
    pub origin_city: Option<String>,
    pub origin_address: Option<String>,
    pub origin_postal_code: Option<String>,
    pub destination_country: Option<String>,
    pub destination_city: Option<String>,
    pub destination_address: Option<String>,
    pub destination_postal_code: Option<String>,
    pub quantity: Option<i32>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub stackable: Option<bool>,
    pub declared_value_usd: Option<f64>,
    pub packaging_type: Option<String>,
    pub hazardous: Option<bool>,
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub assigned_to_name: Option<String>,
    pub created_by: Uuid,
    pub created_by_name: Option<String>,
    pub created_at: String,
}

/// Route and cargo attributes a client can set on create and replace on update.
#[derive(Debug, Deserialize)]
pub struct RequestDetails {
    pub service_type: ServiceType,
    pub origin_country: Option<String>,
    pub origin_city: Option<String>,
    pub origin_address: Option<String>,
    pub origin_postal_code: Option<String>,
    pub destination_country: Option<String>,
    pub destination_city: Option<String>,
    pub destination_address: Option<String>,
    pub destination_postal_code: Option<String>,
    pub quantity: Option<i32>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub stackable: Option<bool>,
    pub declared_value_usd: Option<f64>,
    pub packaging_type: Option<String>,
    pub hazardous: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub company_code: String,
    pub issue_date: Option<NaiveDate>,
    pub client_id: Uuid,
    #[serde(flatten)]
    pub details: RequestDetails,
}

#[derive(AsChangeset)]
#[diesel(table_name = shipment_requests, treat_none_as_null = true)]
struct RequestDetailsChangeset {
    service_type: String,
    origin_country: Option<String>,
    origin_city: Option<String>,
    origin_address: Option<String>,
    origin_postal_code: Option<String>,
    destination_country: Option<String>,
    destination_city: Option<String>,
    destination_address: Option<String>,
    destination_postal_code: Option<String>,
    quantity: Option<i32>,
    length_cm: Option<f64>,
    width_cm: Option<f64>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    stackable: Option<bool>,
    declared_value_usd: Option<f64>,
    packaging_type: Option<String>,
    hazardous: Option<bool>,
}

impl RequestDetails {
    fn validate(&self, errors: &mut FieldErrors) {
        if matches!(self.quantity, Some(q) if q <= 0) {
            errors.add("quantity", "must be greater than 0");
        }
        errors.max_len("origin_country", self.origin_country.as_deref(), 120);
        errors.max_len("origin_city", self.origin_city.as_deref(), 120);
        errors.max_len("origin_postal_code", self.origin_postal_code.as_deref(), 20);
        errors.max_len("destination_country", self.destination_country.as_deref(), 120);
        errors.max_len("destination_city", self.destination_city.as_deref(), 120);
        errors.max_len("destination_postal_code", self.destination_postal_code.as_deref(), 20);
        errors.max_len("packaging_type", self.packaging_type.as_deref(), 80);
        errors.require_non_negative("length_cm", self.length_cm);
        errors.require_non_negative("width_cm", self.width_cm);
        errors.require_non_negative("height_cm", self.height_cm);
        errors.require_non_negative("weight_kg", self.weight_kg);
        errors.require_non_negative("declared_value_usd", self.declared_value_usd);
    }

    fn into_changeset(self) -> RequestDetailsChangeset {
        RequestDetailsChangeset {
            service_type: self.service_type.as_str().to_string(),
            origin_country: normalize_optional(self.origin_country.as_deref()),
            origin_city: normalize_optional(self.origin_city.as_deref()),
            origin_address: normalize_optional(self.origin_address.as_deref()),
            origin_postal_code: normalize_optional(self.origin_postal_code.as_deref()),
            destination_country: normalize_optional(self.destination_country.as_deref()),
            destination_city: normalize_optional(self.destination_city.as_deref()),
            destination_address: normalize_optional(self.destination_address.as_deref()),
            destination_postal_code: normalize_optional(self.destination_postal_code.as_deref()),
            quantity: self.quantity,
            length_cm: self.length_cm,
            width_cm: self.width_cm,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            stackable: self.stackable,
            declared_value_usd: self.declared_value_usd,
            packaging_type: normalize_optional(self.packaging_type.as_deref()),
            hazardous: self.hazardous,
        }
    }
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub estado: Status,
}

#[derive(Deserialize)]
pub struct AssignQuery {
    pub empleado_id: Uuid,
}

#[derive(Serialize)]
pub struct QuoteTimeline {
    pub quote_id: Uuid,
    pub provider_name: Option<String>,
    pub status: String,
    pub history: Vec<HistoryEntryResponse>,
}

#[derive(Serialize)]
pub struct RequestTimeline {
    pub request: RequestResponse,
    pub request_history: Vec<HistoryEntryResponse>,
    pub quotes: Vec<QuoteTimeline>,
    pub total_events: usize,
}

/// Resolves client and employee names for a batch of requests.
pub(crate) fn present_requests(
    conn: &mut PgConnection,
    requests: Vec<ShipmentRequest>,
) -> AppResult<Vec<RequestResponse>> {
    let client_ids: Vec<Uuid> = requests.iter().map(|r| r.client_id).collect();
    let employee_ids: Vec<Uuid> = requests
        .iter()
        .flat_map(|r| std::iter::once(r.created_by).chain(r.assigned_to))
        .collect();

    let client_names: HashMap<Uuid, String> = clients::table
        .filter(clients::id.eq_any(client_ids))
        .select((clients::id, clients::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();
    let employee_names: HashMap<Uuid, String> = employees::table
        .filter(employees::id.eq_any(employee_ids))
        .select((employees::id, employees::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    Ok(requests
        .into_iter()
        .map(|r| RequestResponse {
            client_name: client_names.get(&r.client_id).cloned(),
            assigned_to_name: r.assigned_to.and_then(|id| employee_names.get(&id).cloned()),
            created_by_name: employee_names.get(&r.created_by).cloned(),
            id: r.id,
            folio: r.folio,
            company_code: r.company_code,
            issue_date: r.issue_date,
            client_id: r.client_id,
            service_type: r.service_type,
            origin_country: r.origin_country,
            origin_city: r.origin_city,
            origin_address: r.origin_address,
            origin_postal_code: r.origin_postal_code,
            destination_country: r.destination_country,
            destination_city: r.destination_city,
            destination_address: r.destination_address,
            destination_postal_code: r.destination_postal_code,
            quantity: r.quantity,
            length_cm: r.length_cm,
            width_cm: r.width_cm,
            height_cm: r.height_cm,
            weight_kg: r.weight_kg,
            stackable: r.stackable,
            declared_value_usd: r.declared_value_usd,
            packaging_type: r.packaging_type,
            hazardous: r.hazardous,
            status: r.status,
            assigned_to: r.assigned_to,
            created_by: r.created_by,
            created_at: to_iso(r.created_at),
        })
        .collect())
}

fn present_one(conn: &mut PgConnection, request: ShipmentRequest) -> AppResult<RequestResponse> {
    present_requests(conn, vec![request])?
        .pop()
        .ok_or_else(|| AppError::internal("request vanished while presenting"))
}

pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let rows: Vec<ShipmentRequest> = shipment_requests::table
        .order(shipment_requests::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(present_requests(&mut conn, rows)?))
}

pub async fn list_recent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppQuery(query): AppQuery<RecentQuery>,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::PRICING_OR_ADMIN)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    let mut conn = state.db()?;
    let rows: Vec<ShipmentRequest> = shipment_requests::table
        .order(shipment_requests::created_at.desc())
        .limit(limit)
        .load(&mut conn)?;
    Ok(Json(present_requests(&mut conn, rows)?))
}

pub async fn get_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<RequestResponse>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let request: ShipmentRequest = shipment_requests::table
        .find(request_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("shipment request not found"))?;
    Ok(Json(present_one(&mut conn, request)?))
}

pub async fn create_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<CreateRequestPayload>,
) -> AppResult<(StatusCode, Json<RequestResponse>)> {
    user.require_role(auth::SALES)?;
    let mut errors = FieldErrors::new();
    let company_code = match folio::normalize_company_code(&payload.company_code) {
        Ok(code) => Some(code),
        Err(err) => {
            errors.add("company_code", err.to_string());
            None
        }
    };
    payload.details.validate(&mut errors);
    errors.finish()?;
    let company_code = company_code.ok_or_else(|| AppError::bad_request("invalid company code"))?;

    let mut conn = state.db()?;
    let client_exists = clients::table
        .find(payload.client_id)
        .select(clients::id)
        .first::<Uuid>(&mut conn)
        .optional()?
        .is_some();
    if !client_exists {
        let mut errors = FieldErrors::new();
        errors.add("client_id", "client does not exist");
        errors.finish()?;
    }

    let today = Utc::now().date_naive();
    let details = payload.details.into_changeset();
    let new_request = NewShipmentRequest {
        id: Uuid::new_v4(),
        folio: String::new(),
        company_code,
        issue_date: payload.issue_date.unwrap_or(today),
        client_id: payload.client_id,
        service_type: details.service_type,
        origin_country: details.origin_country,
        origin_city: details.origin_city,
        origin_address: details.origin_address,
        origin_postal_code: details.origin_postal_code,
        destination_country: details.destination_country,
        destination_city: details.destination_city,
        destination_address: details.destination_address,
        destination_postal_code: details.destination_postal_code,
        quantity: details.quantity,
        length_cm: details.length_cm,
        width_cm: details.width_cm,
        height_cm: details.height_cm,
        weight_kg: details.weight_kg,
        stackable: details.stackable,
        declared_value_usd: details.declared_value_usd,
        packaging_type: details.packaging_type,
        hazardous: details.hazardous,
        status: Status::Pendiente.as_str().to_string(),
        assigned_to: None,
        created_by: user.employee_id,
    };

    let created = conn.transaction::<_, AppError, _>(|conn| {
        let created = folio::insert_with_folio(conn, new_request, today.year())?;
        history::record(
            conn,
            EntityType::Solicitud,
            created.id,
            history::ACTION_CREATED,
            Some(format!("Request created with folio {}", created.folio)),
            user.employee_id,
        )?;
        Ok(created)
    })?;

    tracing::info!(request_id = %created.id, folio = %created.folio, "shipment request created");
    Ok((StatusCode::CREATED, Json(present_one(&mut conn, created)?)))
}

pub async fn update_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
    AppJson(payload): AppJson<RequestDetails>,
) -> AppResult<Json<RequestResponse>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut errors = FieldErrors::new();
    payload.validate(&mut errors);
    errors.finish()?;

    let mut conn = state.db()?;
    let changeset = payload.into_changeset();
    let updated = conn.transaction::<_, AppError, _>(|conn| {
        let updated: ShipmentRequest = diesel::update(shipment_requests::table.find(request_id))
            .set(&changeset)
            .get_result(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("shipment request not found"))?;
        history::record(
            conn,
            EntityType::Solicitud,
            updated.id,
            history::ACTION_UPDATED,
            Some(format!("Request {} updated", updated.folio)),
            user.employee_id,
        )?;
        Ok(updated)
    })?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn change_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<StatusQuery>,
) -> AppResult<Json<RequestResponse>> {
    user.require_role(auth::PRICING)?;
    let mut conn = state.db()?;
    let updated =
        workflow::change_request_status(&mut conn, request_id, query.estado, user.employee_id)?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn list_by_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(status): AppPath<Status>,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let rows: Vec<ShipmentRequest> = shipment_requests::table
        .filter(shipment_requests::status.eq(status.as_str()))
        .order(shipment_requests::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(present_requests(&mut conn, rows)?))
}

pub async fn list_assigned_to(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::PRICING_OR_ADMIN)?;
    let mut conn = state.db()?;
    Ok(Json(assigned_requests(&mut conn, employee_id)?))
}

pub async fn assign_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<AssignQuery>,
) -> AppResult<Json<RequestResponse>> {
    user.require_role(auth::PRICING)?;
    let mut conn = state.db()?;
    let updated = conn.transaction::<_, AppError, _>(|conn| {
        let assignee: Employee = employees::table
            .find(query.empleado_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("employee not found"))?;
        let updated: ShipmentRequest = diesel::update(shipment_requests::table.find(request_id))
            .set(shipment_requests::assigned_to.eq(Some(assignee.id)))
            .get_result(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("shipment request not found"))?;
        history::record(
            conn,
            EntityType::Solicitud,
            updated.id,
            history::ACTION_ASSIGNED,
            Some(json!({ "empleado_id": assignee.id, "empleado": assignee.name }).to_string()),
            user.employee_id,
        )?;
        Ok(updated)
    })?;
    Ok(Json(present_one(&mut conn, updated)?))
}

pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::SALES_OR_PRICING)?;
    let mut conn = state.db()?;
    let rows: Vec<ShipmentRequest> = shipment_requests::table
        .filter(shipment_requests::created_by.eq(user.employee_id))
        .order(shipment_requests::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(present_requests(&mut conn, rows)?))
}

pub async fn list_assigned_to_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestResponse>>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    Ok(Json(assigned_requests(&mut conn, user.employee_id)?))
}

pub async fn full_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(request_id): AppPath<Uuid>,
) -> AppResult<Json<RequestTimeline>> {
    user.require_role(auth::ANY_ROLE)?;
    let mut conn = state.db()?;
    let request: ShipmentRequest = shipment_requests::table
        .find(request_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("shipment request not found"))?;

    let request_entries = history::list_for_entity(&mut conn, EntityType::Solicitud, request_id)?;
    let request_history = present_entries(&mut conn, request_entries)?;

    let quote_rows: Vec<(Quote, String)> = quotes::table
        .inner_join(providers::table)
        .filter(quotes::request_id.eq(request_id))
        .order(quotes::created_at.asc())
        .select((quotes::all_columns, providers::name))
        .load(&mut conn)?;

    let mut quote_timelines = Vec::with_capacity(quote_rows.len());
    for (quote, provider_name) in quote_rows {
        let entries = history::list_for_entity(&mut conn, EntityType::Cotizacion, quote.id)?;
        quote_timelines.push(QuoteTimeline {
            quote_id: quote.id,
            provider_name: Some(provider_name),
            status: quote.status,
            history: present_entries(&mut conn, entries)?,
        });
    }

    let total_events = request_history.len()
        + quote_timelines
            .iter()
            .map(|timeline| timeline.history.len())
            .sum::<usize>();

    Ok(Json(RequestTimeline {
        request: present_one(&mut conn, request)?,
        request_history,
        quotes: quote_timelines,
        total_events,
    }))
}

fn assigned_requests(conn: &mut PgConnection, employee_id: Uuid) -> AppResult<Vec<RequestResponse>> {
    let rows: Vec<ShipmentRequest> = shipment_requests::table
        .filter(shipment_requests::assigned_to.eq(employee_id))
        .order(shipment_requests::created_at.desc())
        .load(conn)?;
    present_requests(conn, rows)
}
