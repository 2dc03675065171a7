//! Concurrency tests against a real Postgres. They need a reachable
//! DATABASE_URL, so they are ignored by default:
//! `cargo test -p tocarde-store -- --ignored`

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tocarde_core::models::{Event, EventHosting, Membership};
use tocarde_core::DomainError;
use tocarde_store::{EventRepository, HostingRepository, MembershipRepository, StoreError};

fn sample_event() -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        name: "Congress".to_string(),
        description: None,
        location: "Leuven".to_string(),
        start_date: now + Duration::days(30),
        end_date: now + Duration::days(32),
        url_signup: None,
        url_website: None,
        prices: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn sample_hosting(event_id: Uuid, host_id: Uuid) -> EventHosting {
    let now = Utc::now();
    EventHosting {
        id: Uuid::new_v4(),
        event_id,
        host_id,
        available_beds: 2,
        custom_rules: None,
        address_override: None,
        city_override: None,
        zip_code_override: None,
        country_override: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn assert_conflict(result: Result<impl Sized, StoreError>) {
    match result {
        Err(StoreError::Domain(DomainError::Conflict { .. })) => {}
        other => panic!("expected a conflict, got {:?}", other.map(|_| ())),
    }
}

// One requester firing at two hostings of the same event at once must
// end up with a single live request; the loser sees the winner's row
// once the event lock is released.
#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn concurrent_requests_across_sibling_hostings(pool: PgPool) {
    let events = EventRepository::new(pool.clone());
    let hostings = HostingRepository::new(pool.clone());

    let event = sample_event();
    events.create(&event).await.unwrap();
    let h1 = sample_hosting(event.id, Uuid::new_v4());
    let h2 = sample_hosting(event.id, Uuid::new_v4());
    hostings.create(&h1).await.unwrap();
    hostings.create(&h2).await.unwrap();

    let requester = Uuid::new_v4();
    let (a, b) = tokio::join!(
        hostings.create_request(h1.id, requester, None),
        hostings.create_request(h2.id, requester, None),
    );

    assert!(
        a.is_ok() != b.is_ok(),
        "exactly one of the two requests must survive"
    );
    assert_conflict(if a.is_ok() { b } else { a });
}

// Two overlapping active periods created at once for a user with no
// existing rows: the advisory lock serializes the overlap checks even
// though there is no row to lock.
#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn concurrent_overlapping_membership_creates(pool: PgPool) {
    let memberships = MembershipRepository::new(pool);

    let user = Uuid::new_v4();
    let start = Utc::now();
    let first = Membership::new(user, start, start + Duration::days(365));
    let second = Membership::new(
        user,
        start + Duration::days(30),
        start + Duration::days(400),
    );

    let (a, b) = tokio::join!(memberships.create(&first), memberships.create(&second));

    assert!(
        a.is_ok() != b.is_ok(),
        "exactly one of the two periods must survive"
    );
    assert_conflict(if a.is_ok() { b } else { a });
}
