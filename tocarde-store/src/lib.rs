//! PostgreSQL persistence for the tocarde backend. Every
//! capacity-affecting write runs in a single transaction that locks the
//! resource row before re-reading counts, so two actors racing for the
//! last seat serialize instead of overbooking.

pub mod app_config;
pub mod database;
pub mod error;
pub mod event_repo;
pub mod hosting_repo;
pub mod membership_repo;
pub mod payment_repo;
pub mod request_repo;
pub mod trip_repo;

pub use database::DbClient;
pub use error::StoreError;
pub use event_repo::EventRepository;
pub use hosting_repo::HostingRepository;
pub use membership_repo::MembershipRepository;
pub use payment_repo::PaymentRepository;
pub use request_repo::CarpoolRequestRepository;
pub use trip_repo::TripRepository;
