use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tocarde_core::lifecycle;
use tocarde_core::models::CarpoolTrip;

use crate::error::StoreError;

#[derive(Clone)]
pub struct TripRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub event_id: Option<Uuid>,
    pub departure_city: String,
    pub departure_address: Option<String>,
    pub arrival_city: String,
    pub arrival_address: Option<String>,
    pub departure_datetime: DateTime<Utc>,
    pub return_datetime: Option<DateTime<Utc>>,
    pub has_return: bool,
    pub seats_total: i32,
    pub price_per_seat_cents: i64,
    pub additional_info: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripRow {
    pub(crate) fn into_model(self) -> CarpoolTrip {
        CarpoolTrip {
            id: self.id,
            driver_id: self.driver_id,
            event_id: self.event_id,
            departure_city: self.departure_city,
            departure_address: self.departure_address,
            arrival_city: self.arrival_city,
            arrival_address: self.arrival_address,
            departure_datetime: self.departure_datetime,
            return_datetime: self.return_datetime,
            has_return: self.has_return,
            seats_total: self.seats_total,
            price_per_seat_cents: self.price_per_seat_cents,
            additional_info: self.additional_info,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TripWithSeatsRow {
    #[sqlx(flatten)]
    trip: TripRow,
    seats_accepted: i64,
}

/// A trip with its live accepted-seat count, for listings and detail
/// responses.
#[derive(Debug, Clone)]
pub struct TripWithSeats {
    pub trip: CarpoolTrip,
    pub seats_accepted: i64,
}

impl TripWithSeats {
    pub fn seats_available(&self) -> i64 {
        i64::from(self.trip.seats_total) - self.seats_accepted
    }
}

#[derive(Debug, Default, Clone)]
pub struct TripFilter {
    pub event_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub departure_city: Option<String>,
    pub arrival_city: Option<String>,
    pub is_active: Option<bool>,
    pub has_seats: bool,
    pub departure_after: Option<DateTime<Utc>>,
    pub departure_before: Option<DateTime<Utc>>,
}

const TRIP_WITH_SEATS: &str = r#"
    SELECT t.*,
           COALESCE(SUM(r.seats_requested)
               FILTER (WHERE r.status = 'ACCEPTED' AND r.is_active), 0) AS seats_accepted
    FROM carpool_trips t
    LEFT JOIN carpool_requests r ON r.trip_id = t.id
"#;

/// Accepted seat count for a trip, read inside the caller's transaction
/// so it is consistent with the row lock taken on the trip.
pub(crate) async fn accepted_seats(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(seats_requested), 0) FROM carpool_requests
         WHERE trip_id = $1 AND status = 'ACCEPTED' AND is_active",
    )
    .bind(trip_id)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn lock_trip(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
) -> Result<TripRow, StoreError> {
    sqlx::query_as::<_, TripRow>("SELECT * FROM carpool_trips WHERE id = $1 FOR UPDATE")
        .bind(trip_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound("trip"))
}

impl TripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, trip: &CarpoolTrip) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO carpool_trips
                (id, driver_id, event_id, departure_city, departure_address,
                 arrival_city, arrival_address, departure_datetime, return_datetime,
                 has_return, seats_total, price_per_seat_cents, additional_info, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(trip.id)
        .bind(trip.driver_id)
        .bind(trip.event_id)
        .bind(&trip.departure_city)
        .bind(&trip.departure_address)
        .bind(&trip.arrival_city)
        .bind(&trip.arrival_address)
        .bind(trip.departure_datetime)
        .bind(trip.return_datetime)
        .bind(trip.has_return)
        .bind(trip.seats_total)
        .bind(trip.price_per_seat_cents)
        .bind(&trip.additional_info)
        .bind(trip.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<TripWithSeats>, StoreError> {
        let sql = format!("{} WHERE t.id = $1 GROUP BY t.id", TRIP_WITH_SEATS);
        let row = sqlx::query_as::<_, TripWithSeatsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| TripWithSeats {
            trip: r.trip.into_model(),
            seats_accepted: r.seats_accepted,
        }))
    }

    pub async fn list(&self, filter: &TripFilter) -> Result<Vec<TripWithSeats>, StoreError> {
        let sql = format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR t.event_id = $1)
              AND ($2::uuid IS NULL OR t.driver_id = $2)
              AND ($3::text IS NULL OR t.departure_city ILIKE $3)
              AND ($4::text IS NULL OR t.arrival_city ILIKE $4)
              AND ($5::boolean IS NULL OR t.is_active = $5)
              AND ($6::timestamptz IS NULL OR t.departure_datetime >= $6)
              AND ($7::timestamptz IS NULL OR t.departure_datetime <= $7)
            GROUP BY t.id
            HAVING $8 = FALSE
                OR t.seats_total > COALESCE(SUM(r.seats_requested)
                    FILTER (WHERE r.status = 'ACCEPTED' AND r.is_active), 0)
            ORDER BY t.departure_datetime DESC
            "#,
            TRIP_WITH_SEATS
        );

        let rows = sqlx::query_as::<_, TripWithSeatsRow>(&sql)
            .bind(filter.event_id)
            .bind(filter.driver_id)
            .bind(&filter.departure_city)
            .bind(&filter.arrival_city)
            .bind(filter.is_active)
            .bind(filter.departure_after)
            .bind(filter.departure_before)
            .bind(filter.has_seats)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| TripWithSeats {
                trip: r.trip.into_model(),
                seats_accepted: r.seats_accepted,
            })
            .collect())
    }

    /// Updates a trip. Runs under the trip row lock so that lowering
    /// `seats_total` below the accepted seat count is rejected instead of
    /// leaving the trip overbooked.
    pub async fn update(&self, trip: &CarpoolTrip) -> Result<CarpoolTrip, StoreError> {
        let mut tx = self.pool.begin().await?;

        lock_trip(&mut tx, trip.id).await?;
        let accepted = accepted_seats(&mut tx, trip.id).await?;
        lifecycle::validate_capacity_edit(i64::from(trip.seats_total), accepted)?;

        let row = sqlx::query_as::<_, TripRow>(
            r#"
            UPDATE carpool_trips SET
                event_id = $2, departure_city = $3, departure_address = $4,
                arrival_city = $5, arrival_address = $6, departure_datetime = $7,
                return_datetime = $8, has_return = $9, seats_total = $10,
                price_per_seat_cents = $11, additional_info = $12, is_active = $13,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(trip.id)
        .bind(trip.event_id)
        .bind(&trip.departure_city)
        .bind(&trip.departure_address)
        .bind(&trip.arrival_city)
        .bind(&trip.arrival_address)
        .bind(trip.departure_datetime)
        .bind(trip.return_datetime)
        .bind(trip.has_return)
        .bind(trip.seats_total)
        .bind(trip.price_per_seat_cents)
        .bind(&trip.additional_info)
        .bind(trip.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_model())
    }

    /// Trips are soft-deactivated, never deleted.
    pub async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE carpool_trips SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("trip"));
        }
        Ok(())
    }
}
