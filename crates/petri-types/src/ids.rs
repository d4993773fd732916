//! Type-safe identity wrappers.
//!
//! The remote engine hands out opaque string identities. Wrapping them in
//! distinct newtypes keeps a simulation identity from being passed where an
//! organism identity is expected.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an opaque [`String`] identity.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an identity issued by the engine.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Generate a fresh identity (UUID v7, time-ordered).
            ///
            /// Only local stand-ins for the engine mint identities.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the raw identity string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identity of one simulation run on the remote engine.
    SimulationId
}

define_id! {
    /// Identity of one organism, unique within a display set.
    OrganismId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let id = SimulationId::new("sim-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sim-42\"");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(SimulationId::generate(), SimulationId::generate());
    }
}
