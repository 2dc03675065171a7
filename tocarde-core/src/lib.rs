//! Domain logic for the tocarde backend: capacity accounting, the
//! request lifecycle state machine, payment reconciliation and the
//! membership overlap guard. Everything here is pure and synchronous;
//! persistence and HTTP live in `tocarde-store` and `tocarde-api`.

pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod membership;
pub mod models;
pub mod payment;

pub use error::DomainError;
pub use ledger::CapacityView;
pub use lifecycle::RequestSnapshot;
