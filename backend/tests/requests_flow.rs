mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use common::{acquire_db_lock, read_json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

fn request_payload(client_id: Uuid, company_code: &str) -> Value {
    json!({
        "company_code": company_code,
        "client_id": client_id,
        "service_type": "TERRESTRE",
        "origin_country": "MX",
        "origin_city": "Monterrey",
        "destination_country": "US",
        "destination_city": "Laredo",
        "quantity": 4,
        "weight_kg": 1200.0,
        "packaging_type": "Pallet",
        "hazardous": false,
    })
}

#[tokio::test]
async fn folios_are_sequential_per_company_and_year() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (seller_id, seller) = app.signed_in("seller@example.com", "VENDEDOR").await?;
    let client_id = app.insert_client("Acme Foods").await?;
    let year = Utc::now().year();

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "acme"), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first: Value = read_json(response).await?;
    assert_eq!(first["folio"], format!("ACME-00001-{year}"));
    assert_eq!(first["status"], "PENDIENTE");
    assert_eq!(first["client_name"], "Acme Foods");
    assert_eq!(first["created_by"], seller_id.to_string());

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "ACME"), Some(&seller))
        .await?;
    let second: Value = read_json(response).await?;
    assert_eq!(second["folio"], format!("ACME-00002-{year}"));

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "beta"), Some(&seller))
        .await?;
    let other: Value = read_json(response).await?;
    assert_eq!(other["folio"], format!("BETA-00001-{year}"));

    let response = app.get("/api/solicitudes/mis", Some(&seller)).await?;
    let mine: Vec<Value> = read_json(response).await?;
    assert_eq!(mine.len(), 3);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn creation_is_limited_to_sales_and_validated() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, seller) = app.signed_in("seller@example.com", "VENDEDOR").await?;
    let (_, pricing) = app.signed_in("pricing@example.com", "PRICING").await?;
    let client_id = app.insert_client("Acme Foods").await?;

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "ACME"), Some(&pricing))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut bad = request_payload(client_id, "AC ME");
    bad["weight_kg"] = json!(-5.0);
    let response = app.post_json("/api/solicitudes", &bad, Some(&seller)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .map(|details| details.iter().filter_map(|d| d["field"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(fields, vec!["company_code", "weight_kg"]);

    let mut bad = request_payload(client_id, "ACME");
    bad["origin_city"] = json!("M".repeat(200));
    bad["packaging_type"] = json!("P".repeat(81));
    let response = app.post_json("/api/solicitudes", &bad, Some(&seller)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .map(|details| details.iter().filter_map(|d| d["field"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(fields, vec!["origin_city", "packaging_type"]);

    let mut bad = request_payload(client_id, "ACME");
    bad["service_type"] = json!("TELEPORT");
    let response = app.post_json("/api/solicitudes", &bad, Some(&seller)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/solicitudes", &request_payload(Uuid::new_v4(), "ACME"), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .get(&format!("/api/solicitudes/{}", Uuid::new_v4()), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = read_json(response).await?;
    assert_eq!(body["code"], "NOT_FOUND");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn status_workflow_is_enforced_and_audited() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, seller) = app.signed_in("seller@example.com", "VENDEDOR").await?;
    let (_, pricing) = app.signed_in("pricing@example.com", "PRICING").await?;
    let client_id = app.insert_client("Acme Foods").await?;

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "ACME"), Some(&seller))
        .await?;
    let created: Value = read_json(response).await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();
    let request_id: Uuid = id.parse()?;

    let response = app
        .put(&format!("/api/solicitudes/{id}/estado?estado=ENVIADO"), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put(&format!("/api/solicitudes/{id}/estado?estado=ENVIADO"), Some(&pricing))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let sent: Value = read_json(response).await?;
    assert_eq!(sent["status"], "ENVIADO");

    let before = app.history_count(request_id).await?;
    let response = app
        .put(&format!("/api/solicitudes/{id}/estado?estado=PENDIENTE"), Some(&pricing))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(app.history_count(request_id).await?, before);

    let response = app
        .put(&format!("/api/solicitudes/{id}/estado?estado=COMPLETADO"), Some(&pricing))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/solicitudes/estado/COMPLETADO", Some(&seller)).await?;
    let completed: Vec<Value> = read_json(response).await?;
    assert_eq!(completed.len(), 1);

    let response = app
        .get(&format!("/api/historial/SOLICITUD/{id}"), Some(&seller))
        .await?;
    let entries: Vec<Value> = read_json(response).await?;
    let actions: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry["action"].as_str())
        .collect();
    assert_eq!(actions, vec!["CREADO", "ESTADO_CAMBIADO", "ESTADO_CAMBIADO"]);
    let detail: Value = serde_json::from_str(entries[1]["detail"].as_str().unwrap_or("{}"))?;
    assert_eq!(detail["estado_anterior"], "PENDIENTE");
    assert_eq!(detail["estado_nuevo"], "ENVIADO");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn assignment_update_and_full_history() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, seller) = app.signed_in("seller@example.com", "VENDEDOR").await?;
    let (pricing_id, pricing) = app.signed_in("pricing@example.com", "PRICING").await?;
    let client_id = app.insert_client("Acme Foods").await?;

    let response = app
        .post_json("/api/solicitudes", &request_payload(client_id, "ACME"), Some(&seller))
        .await?;
    let created: Value = read_json(response).await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let response = app
        .put(
            &format!("/api/solicitudes/{id}/asignar?empleado_id={}", Uuid::new_v4()),
            Some(&pricing),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .put(
            &format!("/api/solicitudes/{id}/asignar?empleado_id={pricing_id}"),
            Some(&pricing),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let assigned: Value = read_json(response).await?;
    assert_eq!(assigned["assigned_to"], pricing_id.to_string());

    let response = app.get("/api/solicitudes/asignadas", Some(&pricing)).await?;
    let mine: Vec<Value> = read_json(response).await?;
    assert_eq!(mine.len(), 1);

    let response = app
        .get(&format!("/api/solicitudes/asignadas/{pricing_id}"), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut update = request_payload(client_id, "ACME");
    update["destination_city"] = json!("Houston");
    update["service_type"] = json!("MULTIMODAL");
    let response = app
        .put_json(&format!("/api/solicitudes/{id}"), &update, Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = read_json(response).await?;
    assert_eq!(updated["destination_city"], "Houston");
    assert_eq!(updated["service_type"], "MULTIMODAL");
    assert_eq!(updated["status"], "PENDIENTE");
    assert_eq!(updated["folio"], created["folio"]);

    let response = app
        .get(&format!("/api/solicitudes/{id}/historial-completo"), Some(&seller))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let timeline: Value = read_json(response).await?;
    let actions: Vec<&str> = timeline["request_history"]
        .as_array()
        .map(|entries| entries.iter().filter_map(|e| e["action"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(actions, vec!["CREADO", "ASIGNADO", "ACTUALIZADO"]);
    assert_eq!(timeline["total_events"], 3);
    assert_eq!(timeline["request_history"][1]["actor_id"], pricing_id.to_string());

    let response = app.get("/api/solicitudes/recientes?limit=5", Some(&seller)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.get("/api/solicitudes/recientes?limit=5", Some(&pricing)).await?;
    let recent: Vec<Value> = read_json(response).await?;
    assert_eq!(recent.len(), 1);

    app.cleanup().await?;
    Ok(())
}
