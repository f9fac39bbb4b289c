//! Balance cancellation.

pub mod cancellation;

pub use cancellation::{
    CancellationGroup, CancellationKind, CancellationPlan, CancellationReport, Movement, detect, movements,
};
