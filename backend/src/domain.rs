//! Enumerations shared by the persistence layer and the HTTP API.
//!
//! Columns store the upper-case wire value; rows are parsed into these types
//! whenever domain logic needs to reason about them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: value.to_owned(),
                    }),
                }
            }
        }
    };
}

wire_enum!(Role, "role", {
    Vendedor => "VENDEDOR",
    Pricing => "PRICING",
    Admin => "ADMIN",
});

wire_enum!(EmployeeStatus, "employee status", {
    Activo => "ACTIVO",
    Inactivo => "INACTIVO",
    Pendiente => "PENDIENTE",
});

wire_enum!(ServiceType, "service type", {
    Terrestre => "TERRESTRE",
    Maritimo => "MARITIMO",
    Aereo => "AEREO",
    Multimodal => "MULTIMODAL",
    ExcesoDimensiones => "EXCESO_DIMENSIONES",
});

wire_enum!(TransportMode, "transport mode", {
    Terrestre => "TERRESTRE",
    Maritimo => "MARITIMO",
    Aereo => "AEREO",
});

wire_enum!(Status, "status", {
    Pendiente => "PENDIENTE",
    Enviado => "ENVIADO",
    Completado => "COMPLETADO",
    Cancelado => "CANCELADO",
});

wire_enum!(EntityType, "entity type", {
    Solicitud => "SOLICITUD",
    Cotizacion => "COTIZACION",
    Usuario => "USUARIO",
});

impl TransportMode {
    /// Quotes carry a transport mode, requests a service type; they match when
    /// the names coincide. Multimodal and oversized requests never match.
    pub fn serves(self, service: ServiceType) -> bool {
        self.as_str() == service.as_str()
    }
}
