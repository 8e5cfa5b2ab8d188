use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod clients;
pub mod emails;
pub mod employees;
pub mod health;
pub mod history;
pub mod providers;
pub mod quotes;
pub mod requests;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/me", get(auth::me));

    let request_routes = Router::new()
        .route(
            "/",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/recientes", get(requests::list_recent))
        .route("/mis", get(requests::list_mine))
        .route("/asignadas", get(requests::list_assigned_to_me))
        .route("/asignadas/:empleado_id", get(requests::list_assigned_to))
        .route("/estado/:estado", get(requests::list_by_status))
        .route(
            "/:id",
            get(requests::get_request).put(requests::update_request),
        )
        .route("/:id/estado", put(requests::change_status))
        .route("/:id/asignar", put(requests::assign_request))
        .route("/:id/historial-completo", get(requests::full_history));

    let quote_routes = Router::new()
        .route("/", get(quotes::list_quotes).post(quotes::create_quote))
        .route("/solicitud/:id", get(quotes::list_by_request))
        .route("/sugerencias", get(quotes::suggestions))
        .route("/calculadora-margen", post(quotes::calculate_margin))
        .route("/comparar/:solicitud_id", get(quotes::compare))
        .route("/reutilizar/:id", post(quotes::reuse_quote))
        .route(
            "/:id",
            put(quotes::update_quote).delete(quotes::delete_quote),
        )
        .route("/:id/estado", put(quotes::change_status))
        .route("/:id/historial", get(quotes::quote_history))
        .route("/:id/margen", put(quotes::apply_margin));

    let employee_routes = Router::new()
        .route(
            "/",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/:id",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route("/:id/aprobar", post(employees::approve_employee))
        .route("/:id/rechazar", post(employees::reject_employee))
        .route("/:id/rol", post(employees::change_role));

    let provider_routes = Router::new()
        .route(
            "/",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/:id",
            get(providers::get_provider)
                .put(providers::update_provider)
                .delete(providers::delete_provider),
        );

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route(
            "/:id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        );

    let email_routes = Router::new()
        .route(
            "/",
            get(emails::list_email_logs).post(emails::create_email_log),
        )
        .route("/destinatario/:email", get(emails::list_by_recipient));

    let history_routes = Router::new()
        .route(
            "/",
            get(history::list_history).post(history::create_history_entry),
        )
        .route("/filtrado", get(history::list_filtered))
        .route("/resumen/:tipo/:id", get(history::summary_for_entity))
        .route("/:tipo/:id", get(history::list_for_entity));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/solicitudes", request_routes)
        .nest("/api/cotizaciones", quote_routes)
        .nest("/api/empleados", employee_routes)
        .nest("/api/proveedores", provider_routes)
        .nest("/api/clientes", client_routes)
        .nest("/api/correos", email_routes)
        .nest("/api/historial", history_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Renders a stored UTC timestamp as RFC 3339.
pub fn to_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).to_rfc3339()
}

/// Trims optional text input, treating blank strings as absent.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}
