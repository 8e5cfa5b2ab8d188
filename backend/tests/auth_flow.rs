mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, read_json, TestApp, PASSWORD};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct Principal {
    email: String,
    role: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    timestamp: String,
}

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, token) = app.signed_in("ana@example.com", "VENDEDOR").await?;

    let response = app.get("/api/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let principal: Principal = read_json(response).await?;
    assert_eq!(principal.email, "ana@example.com");
    assert_eq!(principal.role, "VENDEDOR");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn bad_credentials_and_missing_tokens_are_unauthorized() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_employee("luis@example.com", "PRICING", "ACTIVO").await?;
    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "luis@example.com", "password": "not-the-password" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = read_json(response).await?;
    assert_eq!(body.code, "UNAUTHORIZED");
    assert!(!body.timestamp.is_empty());

    let response = app.get("/api/solicitudes", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/solicitudes", Some("garbage")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn registration_waits_for_admin_approval() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let payload = json!({
        "name": "Marta",
        "email": "Marta@Example.com",
        "password": PASSWORD,
    });
    let response = app.post_json("/api/auth/register", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = read_json(response).await?;
    assert_eq!(created["email"], "marta@example.com");
    assert_eq!(created["role"], "VENDEDOR");
    assert_eq!(created["status"], "PENDIENTE");
    let employee_id = created["id"].as_str().unwrap_or_default().to_string();

    let response = app.post_json("/api/auth/register", &payload, None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "marta@example.com", "password": PASSWORD }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: ErrorBody = read_json(response).await?;
    assert_eq!(body.code, "FORBIDDEN");

    let (_, admin) = app.signed_in("admin@example.com", "ADMIN").await?;
    let response = app
        .post(&format!("/api/empleados/{employee_id}/aprobar"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let token = app.login_token("marta@example.com", PASSWORD).await?;
    assert!(!token.is_empty());

    let response = app
        .get(&format!("/api/historial/USUARIO/{employee_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let entries: Vec<Value> = read_json(response).await?;
    let actions: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry["action"].as_str())
        .collect();
    assert_eq!(actions, vec!["CREADO", "APROBADO"]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn registration_rejects_invalid_fields() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/auth/register",
            &json!({ "name": " ", "email": "nope", "password": "short" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .map(|details| details.iter().filter_map(|d| d["field"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(fields, vec!["name", "email", "password"]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn employee_admin_requires_admin_role() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, seller) = app.signed_in("seller@example.com", "VENDEDOR").await?;
    let response = app.get("/api/empleados", Some(&seller)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (_, admin) = app.signed_in("boss@example.com", "ADMIN").await?;
    let response = app.get("/api/empleados", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let employees: Vec<Value> = read_json(response).await?;
    assert_eq!(employees.len(), 2);

    app.cleanup().await?;
    Ok(())
}
