use sqlx::PgPool;
use tocarde_store::{
    CarpoolRequestRepository, EventRepository, HostingRepository, MembershipRepository,
    PaymentRepository, TripRepository,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub events: EventRepository,
    pub trips: TripRepository,
    pub requests: CarpoolRequestRepository,
    pub payments: PaymentRepository,
    pub hostings: HostingRepository,
    pub memberships: MembershipRepository,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(pool: PgPool, auth: AuthConfig) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            trips: TripRepository::new(pool.clone()),
            requests: CarpoolRequestRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            hostings: HostingRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool),
            auth,
        }
    }
}
