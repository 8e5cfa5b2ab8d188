use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::{
    models::{NewShipmentRequest, ShipmentRequest},
    schema::shipment_requests,
};

pub const MAX_ATTEMPTS: u32 = 5;
const MAX_COMPANY_CODE_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("company code must be 1 to {MAX_COMPANY_CODE_LEN} letters or digits")]
    InvalidCompanyCode,
    #[error("could not allocate a folio for {company_code} after {attempts} attempts")]
    Exhausted { company_code: String, attempts: u32 },
    #[error(transparent)]
    Database(#[from] DieselError),
}

pub fn format_folio(company_code: &str, sequence: i64, year: i32) -> String {
    format!("{company_code}-{sequence:05}-{year}")
}

pub fn normalize_company_code(raw: &str) -> Result<String, FolioError> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = !code.is_empty()
        && code.len() <= MAX_COMPANY_CODE_LEN
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(code)
    } else {
        Err(FolioError::InvalidCompanyCode)
    }
}

/// Number of folios already issued for `company_code` in `year`.
pub fn issued_in_year(conn: &mut PgConnection, company_code: &str, year: i32) -> QueryResult<i64> {
    shipment_requests::table
        .filter(shipment_requests::company_code.eq(company_code))
        .filter(shipment_requests::folio.like(format!("{company_code}-%-{year}")))
        .count()
        .get_result(conn)
}

/// Inserts a request under the next free folio for the company and year.
///
/// Two concurrent writers can read the same count; the loser hits the unique
/// index on `folio` and retries with the following sequence number. Each
/// attempt runs in its own savepoint so the surrounding transaction survives.
pub fn insert_with_folio(
    conn: &mut PgConnection,
    mut request: NewShipmentRequest,
    year: i32,
) -> Result<ShipmentRequest, FolioError> {
    let company_code = request.company_code.clone();
    let mut sequence = issued_in_year(conn, &company_code, year)? + 1;

    for attempt in 1..=MAX_ATTEMPTS {
        request.folio = format_folio(&company_code, sequence, year);
        let inserted = conn.transaction(|conn| {
            diesel::insert_into(shipment_requests::table)
                .values(&request)
                .get_result::<ShipmentRequest>(conn)
        });
        match inserted {
            Ok(row) => return Ok(row),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                tracing::warn!(
                    folio = %request.folio,
                    attempt,
                    "folio already taken, retrying with next sequence"
                );
                sequence += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(FolioError::Exhausted {
        company_code,
        attempts: MAX_ATTEMPTS,
    })
}
