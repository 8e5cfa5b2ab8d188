use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath},
    models::{Client, NewClient},
    routes::{auth::looks_like_email, normalize_optional, to_iso},
    schema::clients,
    state::AppState,
};

#[derive(Serialize)]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub rfc: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub active: bool,
    pub created_at: String,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
            rfc: client.rfc,
            email: client.email,
            phone: client.phone,
            address: client.address,
            city: client.city,
            country: client.country,
            postal_code: client.postal_code,
            active: client.active,
            created_at: to_iso(client.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct ClientPayload {
    pub name: String,
    pub rfc: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub active: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = clients, treat_none_as_null = true)]
struct ClientChangeset {
    name: String,
    rfc: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
    active: bool,
}

/// Normalised column values shared by create and update.
struct ClientFields {
    name: String,
    rfc: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
}

impl ClientPayload {
    fn into_fields(self) -> AppResult<(ClientFields, Option<bool>)> {
        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        let email = normalize_optional(self.email.as_deref()).map(|e| e.to_lowercase());
        if matches!(email.as_deref(), Some(e) if !looks_like_email(e)) {
            errors.add("email", "must be a valid email address");
        }
        let rfc = normalize_optional(self.rfc.as_deref()).map(|r| r.to_uppercase());
        if matches!(rfc.as_deref(), Some(r) if !(12..=13).contains(&r.chars().count())) {
            errors.add("rfc", "must be 12 or 13 characters");
        }
        errors.max_len("name", self.name.as_str(), 160);
        errors.max_len("email", email.as_deref(), 160);
        errors.max_len("phone", self.phone.as_deref(), 40);
        errors.max_len("city", self.city.as_deref(), 120);
        errors.max_len("country", self.country.as_deref(), 120);
        errors.max_len("postal_code", self.postal_code.as_deref(), 20);
        errors.finish()?;

        Ok((
            ClientFields {
                name: self.name.trim().to_string(),
                rfc,
                email,
                phone: normalize_optional(self.phone.as_deref()),
                address: normalize_optional(self.address.as_deref()),
                city: normalize_optional(self.city.as_deref()),
                country: normalize_optional(self.country.as_deref()),
                postal_code: normalize_optional(self.postal_code.as_deref()),
            },
            self.active,
        ))
    }
}

pub async fn list_clients(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<ClientResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Client> = clients::table.order(clients::name.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ClientResponse::from).collect()))
}

pub async fn get_client(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(client_id): AppPath<Uuid>,
) -> AppResult<Json<ClientResponse>> {
    let mut conn = state.db()?;
    let client: Client = clients::table.find(client_id).first(&mut conn)?;
    Ok(Json(client.into()))
}

pub async fn create_client(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppJson(payload): AppJson<ClientPayload>,
) -> AppResult<(StatusCode, Json<ClientResponse>)> {
    let (fields, active) = payload.into_fields()?;
    let mut conn = state.db()?;
    let new_client = NewClient {
        id: Uuid::new_v4(),
        name: fields.name,
        rfc: fields.rfc,
        email: fields.email,
        phone: fields.phone,
        address: fields.address,
        city: fields.city,
        country: fields.country,
        postal_code: fields.postal_code,
        active: active.unwrap_or(true),
    };

    let client: Client = diesel::insert_into(clients::table)
        .values(&new_client)
        .get_result(&mut conn)
        .map_err(duplicate_identity)?;
    Ok((StatusCode::CREATED, Json(client.into())))
}

pub async fn update_client(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(client_id): AppPath<Uuid>,
    AppJson(payload): AppJson<ClientPayload>,
) -> AppResult<Json<ClientResponse>> {
    let (fields, active) = payload.into_fields()?;
    let mut conn = state.db()?;
    let existing: Client = clients::table.find(client_id).first(&mut conn)?;

    let changeset = ClientChangeset {
        name: fields.name,
        rfc: fields.rfc,
        email: fields.email,
        phone: fields.phone,
        address: fields.address,
        city: fields.city,
        country: fields.country,
        postal_code: fields.postal_code,
        active: active.unwrap_or(existing.active),
    };

    let client: Client = diesel::update(clients::table.find(client_id))
        .set(&changeset)
        .get_result(&mut conn)
        .map_err(duplicate_identity)?;
    Ok(Json(client.into()))
}

pub async fn delete_client(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(client_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let deleted = diesel::delete(clients::table.find(client_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

fn duplicate_identity(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            info,
        ) => {
            let field = match info.constraint_name() {
                Some(name) if name.contains("rfc") => "RFC",
                _ => "email",
            };
            AppError::bad_request(format!("a client with that {field} already exists"))
        }
        other => AppError::from(other),
    }
}
