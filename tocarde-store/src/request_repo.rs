use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use tocarde_core::lifecycle::{self, RequestSnapshot};
use tocarde_core::models::{CarpoolRequest, RequestAction, RequestStatus};
use tocarde_core::CapacityView;

use crate::error::StoreError;
use crate::trip_repo::{accepted_seats, lock_trip};

#[derive(Clone)]
pub struct CarpoolRequestRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    status: String,
    seats_requested: i32,
    message: Option<String>,
    response_message: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_model(self) -> Result<CarpoolRequest, StoreError> {
        let status = RequestStatus::from_str(&self.status).map_err(StoreError::Decode)?;
        Ok(CarpoolRequest {
            id: self.id,
            trip_id: self.trip_id,
            passenger_id: self.passenger_id,
            status,
            seats_requested: self.seats_requested,
            message: self.message,
            response_message: self.response_message,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub trip_id: Option<Uuid>,
    pub passenger_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

async fn live_request_status(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    passenger_id: Uuid,
) -> Result<Option<RequestStatus>, StoreError> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM carpool_requests
         WHERE trip_id = $1 AND passenger_id = $2 AND is_active
           AND status IN ('PENDING', 'ACCEPTED')
         LIMIT 1",
    )
    .bind(trip_id)
    .bind(passenger_id)
    .fetch_optional(&mut **tx)
    .await?;

    status
        .map(|s| RequestStatus::from_str(&s).map_err(StoreError::Decode))
        .transpose()
}

impl CarpoolRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a pending request. The trip row is locked first so the
    /// capacity and uniqueness checks cannot race a concurrent accept or
    /// create against the same trip.
    pub async fn create(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats_requested: i32,
        message: Option<String>,
    ) -> Result<CarpoolRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let trip = lock_trip(&mut tx, trip_id).await?;
        if !trip.is_active {
            return Err(tocarde_core::DomainError::invalid_state(
                "trip",
                "this trip is no longer active",
            )
            .into());
        }

        let accepted = accepted_seats(&mut tx, trip_id).await?;
        let existing = live_request_status(&mut tx, trip_id, passenger_id).await?;
        let capacity = CapacityView::new(i64::from(trip.seats_total), accepted);
        lifecycle::validate_create(
            trip.driver_id,
            passenger_id,
            &capacity,
            i64::from(seats_requested),
            existing,
        )?;

        let mut request = CarpoolRequest::new(trip_id, passenger_id, seats_requested);
        request.message = message;

        sqlx::query(
            r#"
            INSERT INTO carpool_requests
                (id, trip_id, passenger_id, status, seats_requested, message, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(request.id)
        .bind(request.trip_id)
        .bind(request.passenger_id)
        .bind(request.status.as_str())
        .bind(request.seats_requested)
        .bind(&request.message)
        .bind(request.is_active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    /// Applies an accept/reject/cancel action. The trip row lock
    /// serializes the capacity re-read with every other
    /// capacity-affecting write on the same trip.
    pub async fn apply_action(
        &self,
        id: Uuid,
        actor: Uuid,
        action: RequestAction,
        response_message: Option<String>,
    ) -> Result<CarpoolRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let trip_id: Uuid = sqlx::query_scalar("SELECT trip_id FROM carpool_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("request"))?;

        let trip = lock_trip(&mut tx, trip_id).await?;

        // Re-read the request after taking the lock; its status may have
        // changed while we waited.
        let row = sqlx::query_as::<_, RequestRow>("SELECT * FROM carpool_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("request"))?;
        let request = row.into_model()?;

        let accepted = accepted_seats(&mut tx, trip_id).await?;
        let snapshot = RequestSnapshot {
            owner: trip.driver_id,
            requester: request.passenger_id,
            status: request.status,
            units: i64::from(request.seats_requested),
        };
        let capacity = CapacityView::new(i64::from(trip.seats_total), accepted);
        let next = lifecycle::apply_action(&snapshot, actor, action, &capacity)?;

        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            UPDATE carpool_requests
            SET status = $2,
                response_message = COALESCE($3, response_message),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(&response_message)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CarpoolRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>("SELECT * FROM carpool_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RequestRow::into_model).transpose()
    }

    /// The trip driver for a request, used by the API's authorization
    /// predicate.
    pub async fn driver_of(&self, id: Uuid) -> Result<Uuid, StoreError> {
        sqlx::query_scalar(
            "SELECT t.driver_id FROM carpool_requests r
             JOIN carpool_trips t ON t.id = r.trip_id
             WHERE r.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("request"))
    }

    /// Requests visible to a user: their own, or those against their
    /// trips. Staff see everything.
    pub async fn list_visible(
        &self,
        user_id: Uuid,
        is_staff: bool,
        filter: &RequestFilter,
    ) -> Result<Vec<CarpoolRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT r.* FROM carpool_requests r
            JOIN carpool_trips t ON t.id = r.trip_id
            WHERE (r.passenger_id = $1 OR t.driver_id = $1 OR $2)
              AND ($3::uuid IS NULL OR r.trip_id = $3)
              AND ($4::uuid IS NULL OR r.passenger_id = $4)
              AND ($5::text IS NULL OR r.status = $5)
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(is_staff)
        .bind(filter.trip_id)
        .bind(filter.passenger_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RequestRow::into_model).collect()
    }
}
