use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{self, password, AuthenticatedUser},
    domain::{EmployeeStatus, EntityType, Role},
    error::{AppError, AppResult, FieldErrors},
    extract::{AppJson, AppPath, AppQuery},
    history,
    models::{Employee, NewEmployee},
    routes::{auth::looks_like_email, to_iso},
    schema::employees,
    state::AppState,
};

#[derive(Serialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: String,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            role: employee.role,
            status: employee.status,
            created_at: to_iso(employee.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Deserialize)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<EmployeeStatus>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = employees)]
struct EmployeeChangeset {
    name: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
    role: Option<String>,
    status: Option<String>,
}

impl EmployeeChangeset {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }
}

#[derive(Deserialize)]
pub struct RoleQuery {
    pub rol: Role,
}

pub async fn list_employees(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<EmployeeResponse>>> {
    user.require_role(auth::ADMIN)?;
    let mut conn = state.db()?;
    let rows: Vec<Employee> = employees::table
        .order(employees::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(EmployeeResponse::from).collect()))
}

pub async fn get_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    user.require_role(auth::ADMIN)?;
    let mut conn = state.db()?;
    let employee: Employee = employees::table.find(employee_id).first(&mut conn)?;
    Ok(Json(employee.into()))
}

pub async fn create_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(payload): AppJson<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<EmployeeResponse>)> {
    user.require_role(auth::ADMIN)?;
    let mut errors = FieldErrors::new();
    errors.require_text("name", &payload.name);
    errors.max_len("name", payload.name.as_str(), 120);
    errors.require_text("password", &payload.password);
    let email = payload.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        errors.add("email", "must be a valid email address");
    }
    errors.max_len("email", email.as_str(), 160);
    errors.finish()?;

    let mut conn = state.db()?;
    let new_employee = NewEmployee {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email,
        password_hash: password::hash_password(&payload.password)?,
        role: payload.role.unwrap_or(Role::Vendedor).as_str().to_string(),
        status: payload
            .status
            .unwrap_or(EmployeeStatus::Activo)
            .as_str()
            .to_string(),
    };

    let employee: Employee = diesel::insert_into(employees::table)
        .values(&new_employee)
        .get_result(&mut conn)
        .map_err(duplicate_email)?;
    Ok((StatusCode::CREATED, Json(employee.into())))
}

pub async fn update_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateEmployeeRequest>,
) -> AppResult<Json<EmployeeResponse>> {
    user.require_role(auth::ADMIN)?;
    let mut errors = FieldErrors::new();
    if let Some(name) = payload.name.as_deref() {
        errors.require_text("name", name);
    }
    errors.max_len("name", payload.name.as_deref(), 120);
    let email = payload.email.as_deref().map(|e| e.trim().to_lowercase());
    if matches!(email.as_deref(), Some(e) if !looks_like_email(e)) {
        errors.add("email", "must be a valid email address");
    }
    errors.max_len("email", email.as_deref(), 160);
    if let Some(password) = payload.password.as_deref() {
        errors.require_text("password", password);
    }
    errors.finish()?;

    let mut conn = state.db()?;
    let existing: Employee = employees::table.find(employee_id).first(&mut conn)?;

    let changeset = EmployeeChangeset {
        name: payload.name.map(|n| n.trim().to_string()),
        email,
        password_hash: payload
            .password
            .as_deref()
            .map(password::hash_password)
            .transpose()?,
        role: payload.role.map(|r| r.as_str().to_string()),
        status: payload.status.map(|s| s.as_str().to_string()),
    };
    if changeset.is_empty() {
        return Ok(Json(existing.into()));
    }

    let updated: Employee = diesel::update(employees::table.find(employee_id))
        .set(&changeset)
        .get_result(&mut conn)
        .map_err(duplicate_email)?;
    Ok(Json(updated.into()))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    user.require_role(auth::ADMIN)?;
    if employee_id == user.employee_id {
        return Err(AppError::bad_request("administrators cannot delete themselves"));
    }
    let mut conn = state.db()?;
    let deleted = diesel::delete(employees::table.find(employee_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    user.require_role(auth::ADMIN)?;
    let employee = set_status(&state, &user, employee_id, EmployeeStatus::Activo)?;
    Ok(Json(employee.into()))
}

pub async fn reject_employee(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    user.require_role(auth::ADMIN)?;
    let employee = set_status(&state, &user, employee_id, EmployeeStatus::Inactivo)?;
    Ok(Json(employee.into()))
}

pub async fn change_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppPath(employee_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<RoleQuery>,
) -> AppResult<Json<EmployeeResponse>> {
    user.require_role(auth::ADMIN)?;
    let mut conn = state.db()?;
    let employee = conn.transaction::<_, AppError, _>(|conn| {
        let previous: Employee = employees::table.find(employee_id).first(conn)?;
        let updated: Employee = diesel::update(employees::table.find(employee_id))
            .set(employees::role.eq(query.rol.as_str()))
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Usuario,
            employee_id,
            history::ACTION_ROLE_CHANGED,
            Some(json!({ "rol_anterior": previous.role, "rol_nuevo": updated.role }).to_string()),
            user.employee_id,
        )?;
        Ok(updated)
    })?;
    Ok(Json(employee.into()))
}

fn set_status(
    state: &AppState,
    user: &AuthenticatedUser,
    employee_id: Uuid,
    status: EmployeeStatus,
) -> AppResult<Employee> {
    let action = match status {
        EmployeeStatus::Activo => history::ACTION_APPROVED,
        _ => history::ACTION_REJECTED,
    };
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let updated: Employee = diesel::update(employees::table.find(employee_id))
            .set(employees::status.eq(status.as_str()))
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Usuario,
            employee_id,
            action,
            Some(json!({ "estado": status.as_str() }).to_string()),
            user.employee_id,
        )?;
        tracing::info!(employee_id = %employee_id, status = %status, "employee status changed");
        Ok(updated)
    })
}

fn duplicate_email(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => AppError::bad_request("an employee with that email already exists"),
        other => AppError::from(other),
    }
}
