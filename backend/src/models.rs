use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = employees)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = employees)]
pub struct NewEmployee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = clients)]
pub struct Client {
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
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient {
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
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = providers)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = providers)]
pub struct NewProvider {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = shipment_requests)]
#[diesel(belongs_to(Client))]
pub struct ShipmentRequest {
    pub id: Uuid,
    pub folio: String,
    pub company_code: String,
    pub issue_date: NaiveDate,
    pub client_id: Uuid,
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
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipment_requests)]
pub struct NewShipmentRequest {
    pub id: Uuid,
    pub folio: String,
    pub company_code: String,
    pub issue_date: NaiveDate,
    pub client_id: Uuid,
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
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = quotes)]
#[diesel(belongs_to(ShipmentRequest, foreign_key = request_id))]
#[diesel(belongs_to(Provider))]
pub struct Quote {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
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
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = quotes)]
pub struct NewQuote {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
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
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = history_entries)]
#[diesel(belongs_to(Employee, foreign_key = actor_id))]
pub struct HistoryEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub actor_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = history_entries)]
pub struct NewHistoryEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = email_logs)]
pub struct EmailLog {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_logs)]
pub struct NewEmailLog {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}
