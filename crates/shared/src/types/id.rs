//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `DocumentId` where a `ChargeId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(ChargeId, "Unique identifier for a charge.");
typed_id!(TransactionId, "Unique identifier for a bank or card transaction.");
typed_id!(DocumentId, "Unique identifier for an invoice, receipt or other document.");
typed_id!(LedgerRecordId, "Unique identifier for a ledger record.");
typed_id!(
    FinancialEntityId,
    "Unique identifier for a financial entity (business, tax category or account)."
);
typed_id!(BusinessTripId, "Unique identifier for a business trip.");
typed_id!(
    CancellationGroupId,
    "Unique identifier for a set of mutually cancelling ledger records."
);

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
