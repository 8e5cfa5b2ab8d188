use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath},
    models::{NewProvider, Provider},
    routes::{auth::looks_like_email, normalize_optional, to_iso},
    schema::providers,
    state::AppState,
};

#[derive(Serialize)]
pub struct ProviderResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub active: bool,
    pub created_at: String,
}

impl From<Provider> for ProviderResponse {
    fn from(provider: Provider) -> Self {
        Self {
            id: provider.id,
            name: provider.name,
            email: provider.email,
            phone: provider.phone,
            country: provider.country,
            city: provider.city,
            active: provider.active,
            created_at: to_iso(provider.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct ProviderPayload {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub active: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = providers, treat_none_as_null = true)]
struct ProviderChangeset {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    country: Option<String>,
    city: Option<String>,
    active: bool,
}

impl ProviderPayload {
    fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        if let Some(email) = normalize_optional(self.email.as_deref()) {
            if !looks_like_email(&email) {
                errors.add("email", "must be a valid email address");
            }
        }
        errors.max_len("name", self.name.as_str(), 160);
        errors.max_len("email", self.email.as_deref(), 160);
        errors.max_len("phone", self.phone.as_deref(), 40);
        errors.max_len("country", self.country.as_deref(), 120);
        errors.max_len("city", self.city.as_deref(), 120);
        errors.finish()
    }
}

pub async fn list_providers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<ProviderResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Provider> = providers::table
        .order(providers::name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ProviderResponse::from).collect()))
}

pub async fn get_provider(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(provider_id): AppPath<Uuid>,
) -> AppResult<Json<ProviderResponse>> {
    let mut conn = state.db()?;
    let provider: Provider = providers::table.find(provider_id).first(&mut conn)?;
    Ok(Json(provider.into()))
}

pub async fn create_provider(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppJson(payload): AppJson<ProviderPayload>,
) -> AppResult<(StatusCode, Json<ProviderResponse>)> {
    payload.validate()?;
    let mut conn = state.db()?;
    let new_provider = NewProvider {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: normalize_optional(payload.email.as_deref()).map(|e| e.to_lowercase()),
        phone: normalize_optional(payload.phone.as_deref()),
        country: normalize_optional(payload.country.as_deref()),
        city: normalize_optional(payload.city.as_deref()),
        active: payload.active.unwrap_or(true),
    };

    let provider: Provider = diesel::insert_into(providers::table)
        .values(&new_provider)
        .get_result(&mut conn)
        .map_err(duplicate_email)?;
    Ok((StatusCode::CREATED, Json(provider.into())))
}

pub async fn update_provider(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(provider_id): AppPath<Uuid>,
    AppJson(payload): AppJson<ProviderPayload>,
) -> AppResult<Json<ProviderResponse>> {
    payload.validate()?;
    let mut conn = state.db()?;
    let existing: Provider = providers::table.find(provider_id).first(&mut conn)?;

    let changeset = ProviderChangeset {
        name: payload.name.trim().to_string(),
        email: normalize_optional(payload.email.as_deref()).map(|e| e.to_lowercase()),
        phone: normalize_optional(payload.phone.as_deref()),
        country: normalize_optional(payload.country.as_deref()),
        city: normalize_optional(payload.city.as_deref()),
        active: payload.active.unwrap_or(existing.active),
    };

    let provider: Provider = diesel::update(providers::table.find(provider_id))
        .set(&changeset)
        .get_result(&mut conn)
        .map_err(duplicate_email)?;
    Ok(Json(provider.into()))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(provider_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let deleted = diesel::delete(providers::table.find(provider_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

fn duplicate_email(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => AppError::bad_request("a provider with that email already exists"),
        other => AppError::from(other),
    }
}
