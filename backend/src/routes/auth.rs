use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    domain::{EmployeeStatus, EntityType, Role},
    error::{AppError, AppResult, FieldErrors},
    extract::AppJson,
    history,
    models::{Employee, NewEmployee},
    routes::employees::EmployeeResponse,
    schema::employees,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: Role,
    pub name: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    let employee: Employee = employees::table
        .filter(employees::email.eq(payload.email.trim().to_lowercase()))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::invalid_credentials)?;

    let status: EmployeeStatus = employee.status.parse().map_err(AppError::internal)?;
    if status != EmployeeStatus::Activo {
        return Err(AppError::forbidden("account is not active"));
    }

    let valid = password::verify_password(&payload.password, &employee.password_hash)
        .map_err(|_| AppError::invalid_credentials())?;
    if !valid {
        return Err(AppError::invalid_credentials());
    }

    let role: Role = employee.role.parse().map_err(AppError::internal)?;
    let access_token = state
        .jwt
        .generate_token(employee.id, &employee.email, &employee.name, role)
        .map_err(AppError::from)?;

    tracing::info!(employee_id = %employee.id, role = %role, "employee logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
        role,
        name: employee.name,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<EmployeeResponse>)> {
    let mut errors = FieldErrors::new();
    errors.require_text("name", &payload.name);
    errors.max_len("name", payload.name.as_str(), 120);
    let email = payload.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        errors.add("email", "must be a valid email address");
    }
    errors.max_len("email", email.as_str(), 160);
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    errors.finish()?;

    let mut conn = state.db()?;
    let password_hash = password::hash_password(&payload.password)?;
    let new_employee = NewEmployee {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email,
        password_hash,
        role: Role::Vendedor.as_str().to_string(),
        status: EmployeeStatus::Pendiente.as_str().to_string(),
    };

    let employee: Employee = match diesel::insert_into(employees::table)
        .values(&new_employee)
        .get_result(&mut conn)
    {
        Ok(employee) => employee,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("an employee with that email already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    let detail = json!({
        "accion": "registro",
        "email": employee.email,
        "rol": employee.role,
    })
    .to_string();
    if let Err(err) = history::record(
        &mut conn,
        EntityType::Usuario,
        employee.id,
        history::ACTION_CREATED,
        Some(detail),
        employee.id,
    ) {
        tracing::warn!(employee_id = %employee.id, error = %err, "failed to record registration");
    }

    Ok((StatusCode::CREATED, Json(EmployeeResponse::from(employee))))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
