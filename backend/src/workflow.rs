//! Status workflow shared by shipment requests and quotes.
//!
//! Both entities follow the same machine:
//!
//! ```text
//! PENDIENTE -> ENVIADO | CANCELADO
//! ENVIADO   -> COMPLETADO | CANCELADO
//! ```
//!
//! `COMPLETADO` and `CANCELADO` are terminal. The only way to change a stored
//! status is [`change_request_status`] or [`change_quote_status`], which run the
//! guard, persist the new value and append the audit entry in one transaction.

use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{EntityType, Status, UnknownVariant},
    history,
    models::{Quote, ShipmentRequest},
    schema::{quotes, shipment_requests},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("status cannot change from {from} to {to}")]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("stored status is not recognised: {0}")]
    CorruptStatus(#[from] UnknownVariant),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

impl Status {
    pub fn allowed_successors(self) -> &'static [Status] {
        match self {
            Status::Pendiente => &[Status::Enviado, Status::Cancelado],
            Status::Enviado => &[Status::Completado, Status::Cancelado],
            Status::Completado | Status::Cancelado => &[],
        }
    }

    pub fn can_transition_to(self, target: Status) -> bool {
        self.allowed_successors().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_successors().is_empty()
    }
}

pub fn ensure_transition(current: Status, target: Status) -> Result<(), InvalidTransition> {
    if current.can_transition_to(target) {
        Ok(())
    } else {
        Err(InvalidTransition {
            from: current,
            to: target,
        })
    }
}

pub fn change_request_status(
    conn: &mut PgConnection,
    request_id: Uuid,
    target: Status,
    actor_id: Uuid,
) -> Result<ShipmentRequest, WorkflowError> {
    conn.transaction(|conn| {
        let current: String = shipment_requests::table
            .find(request_id)
            .select(shipment_requests::status)
            .for_update()
            .first(conn)?;
        let current: Status = current.parse()?;
        ensure_transition(current, target)?;

        let updated: ShipmentRequest = diesel::update(shipment_requests::table.find(request_id))
            .set(shipment_requests::status.eq(target.as_str()))
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Solicitud,
            request_id,
            history::ACTION_STATUS_CHANGED,
            Some(history::status_change_detail(current, target)),
            actor_id,
        )?;

        tracing::info!(
            request_id = %request_id,
            from = %current,
            to = %target,
            "request status changed"
        );
        Ok(updated)
    })
}

pub fn change_quote_status(
    conn: &mut PgConnection,
    quote_id: Uuid,
    target: Status,
    actor_id: Uuid,
) -> Result<Quote, WorkflowError> {
    conn.transaction(|conn| {
        let current: String = quotes::table
            .find(quote_id)
            .select(quotes::status)
            .for_update()
            .first(conn)?;
        let current: Status = current.parse()?;
        ensure_transition(current, target)?;

        let updated: Quote = diesel::update(quotes::table.find(quote_id))
            .set(quotes::status.eq(target.as_str()))
            .get_result(conn)?;
        history::record(
            conn,
            EntityType::Cotizacion,
            quote_id,
            history::ACTION_STATUS_CHANGED,
            Some(history::status_change_detail(current, target)),
            actor_id,
        )?;

        tracing::info!(
            quote_id = %quote_id,
            from = %current,
            to = %target,
            "quote status changed"
        );
        Ok(updated)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(from: Status, to: Status) -> bool {
        matches!(
            (from, to),
            (Status::Pendiente, Status::Enviado)
                | (Status::Pendiente, Status::Cancelado)
                | (Status::Enviado, Status::Completado)
                | (Status::Enviado, Status::Cancelado)
        )
    }

    #[test]
    fn transition_table_matches_for_every_pair() {
        for &from in Status::ALL {
            for &to in Status::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    expected(from, to),
                    "{from} -> {to}"
                );
                assert_eq!(ensure_transition(from, to).is_ok(), expected(from, to));
            }
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        assert!(Status::Completado.is_terminal());
        assert!(Status::Cancelado.is_terminal());
        assert!(!Status::Pendiente.is_terminal());
        assert!(!Status::Enviado.is_terminal());
    }

    #[test]
    fn self_transitions_are_rejected() {
        for &status in Status::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn completed_back_to_sent_reports_both_states() {
        let err = ensure_transition(Status::Completado, Status::Enviado).unwrap_err();
        assert_eq!(err.from, Status::Completado);
        assert_eq!(err.to, Status::Enviado);
        assert_eq!(err.to_string(), "status cannot change from COMPLETADO to ENVIADO");
    }
}
