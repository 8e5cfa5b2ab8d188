pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extract;
pub mod folio;
pub mod history;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod schema;
pub mod state;
pub mod suggestions;
pub mod workflow;
