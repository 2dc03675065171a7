use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use tocarde_core::lifecycle::{self, RequestSnapshot};
use tocarde_core::models::{EventHosting, EventHostingRequest, RequestAction, RequestStatus};
use tocarde_core::{CapacityView, DomainError};

use crate::error::StoreError;

#[derive(Clone)]
pub struct HostingRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct HostingRow {
    id: Uuid,
    event_id: Uuid,
    host_id: Uuid,
    available_beds: i32,
    custom_rules: Option<String>,
    address_override: Option<String>,
    city_override: Option<String>,
    zip_code_override: Option<String>,
    country_override: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HostingRow {
    fn into_model(self) -> EventHosting {
        EventHosting {
            id: self.id,
            event_id: self.event_id,
            host_id: self.host_id,
            available_beds: self.available_beds,
            custom_rules: self.custom_rules,
            address_override: self.address_override,
            city_override: self.city_override,
            zip_code_override: self.zip_code_override,
            country_override: self.country_override,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HostingRequestRow {
    id: Uuid,
    hosting_id: Uuid,
    requester_id: Uuid,
    status: String,
    message: Option<String>,
    host_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HostingRequestRow {
    fn into_model(self) -> Result<EventHostingRequest, StoreError> {
        let status = RequestStatus::from_str(&self.status).map_err(StoreError::Decode)?;
        Ok(EventHostingRequest {
            id: self.id,
            hosting_id: self.hosting_id,
            requester_id: self.requester_id,
            status,
            message: self.message,
            host_message: self.host_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Bed availability for a hosting, shaped for the available-places
/// endpoint.
#[derive(Debug, Clone, Copy)]
pub struct HostingPlaces {
    pub total_beds: i32,
    pub accepted_guests: i64,
}

impl HostingPlaces {
    pub fn available(&self) -> i64 {
        i64::from(self.total_beds) - self.accepted_guests
    }
}

#[derive(Debug, Default, Clone)]
pub struct HostingFilter {
    pub event_id: Option<Uuid>,
    pub host_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct HostingRequestFilter {
    pub hosting_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

async fn lock_hosting(
    tx: &mut Transaction<'_, Postgres>,
    hosting_id: Uuid,
) -> Result<HostingRow, StoreError> {
    sqlx::query_as::<_, HostingRow>("SELECT * FROM event_hostings WHERE id = $1 FOR UPDATE")
        .bind(hosting_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound("hosting"))
}

/// Locks the event row. The uniqueness key for hosting requests spans
/// every hosting of the event, so the hosting row lock alone cannot
/// order two creates against sibling hostings; the event lock can.
/// Always taken after the hosting lock, never before.
async fn lock_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
) -> Result<(), StoreError> {
    sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn accepted_guests(
    tx: &mut Transaction<'_, Postgres>,
    hosting_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM event_hosting_requests
         WHERE hosting_id = $1 AND status = 'ACCEPTED'",
    )
    .bind(hosting_id)
    .fetch_one(&mut **tx)
    .await
}

/// Live request the user already holds for any hosting of the same
/// event. Uniqueness is event-scoped: one live request per event, not
/// per hosting.
async fn live_request_for_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    requester_id: Uuid,
    excluding: Option<Uuid>,
) -> Result<Option<RequestStatus>, StoreError> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT hr.status FROM event_hosting_requests hr
         JOIN event_hostings h ON h.id = hr.hosting_id
         WHERE h.event_id = $1 AND hr.requester_id = $2
           AND hr.status IN ('PENDING', 'ACCEPTED')
           AND ($3::uuid IS NULL OR hr.id <> $3)
         LIMIT 1",
    )
    .bind(event_id)
    .bind(requester_id)
    .bind(excluding)
    .fetch_optional(&mut **tx)
    .await?;

    status
        .map(|s| RequestStatus::from_str(&s).map_err(StoreError::Decode))
        .transpose()
}

impl HostingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, hosting: &EventHosting) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_hostings
                (id, event_id, host_id, available_beds, custom_rules, address_override,
                 city_override, zip_code_override, country_override, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(hosting.id)
        .bind(hosting.event_id)
        .bind(hosting.host_id)
        .bind(hosting.available_beds)
        .bind(&hosting.custom_rules)
        .bind(&hosting.address_override)
        .bind(&hosting.city_override)
        .bind(&hosting.zip_code_override)
        .bind(&hosting.country_override)
        .bind(hosting.is_active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // (event_id, host_id) unique constraint
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                DomainError::conflict("event", "you already offer a hosting for this event")
                    .into(),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<EventHosting>, StoreError> {
        let row = sqlx::query_as::<_, HostingRow>("SELECT * FROM event_hostings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(HostingRow::into_model))
    }

    pub async fn list(&self, filter: &HostingFilter) -> Result<Vec<EventHosting>, StoreError> {
        let rows = sqlx::query_as::<_, HostingRow>(
            r#"
            SELECT * FROM event_hostings
            WHERE ($1::uuid IS NULL OR event_id = $1)
              AND ($2::uuid IS NULL OR host_id = $2)
              AND ($3::boolean IS NULL OR is_active = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.event_id)
        .bind(filter.host_id)
        .bind(filter.is_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HostingRow::into_model).collect())
    }

    /// Updates a hosting; lowering `available_beds` below the accepted
    /// guest count is rejected, under the same lock accepts take.
    pub async fn update(&self, hosting: &EventHosting) -> Result<EventHosting, StoreError> {
        let mut tx = self.pool.begin().await?;

        lock_hosting(&mut tx, hosting.id).await?;
        let accepted = accepted_guests(&mut tx, hosting.id).await?;
        lifecycle::validate_capacity_edit(i64::from(hosting.available_beds), accepted)?;

        let row = sqlx::query_as::<_, HostingRow>(
            r#"
            UPDATE event_hostings SET
                available_beds = $2, custom_rules = $3, address_override = $4,
                city_override = $5, zip_code_override = $6, country_override = $7,
                is_active = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(hosting.id)
        .bind(hosting.available_beds)
        .bind(&hosting.custom_rules)
        .bind(&hosting.address_override)
        .bind(&hosting.city_override)
        .bind(&hosting.zip_code_override)
        .bind(&hosting.country_override)
        .bind(hosting.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_model())
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE event_hostings SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("hosting"));
        }
        Ok(())
    }

    pub async fn places(&self, id: Uuid) -> Result<HostingPlaces, StoreError> {
        let mut tx = self.pool.begin().await?;
        let hosting = lock_hosting(&mut tx, id).await?;
        let accepted = accepted_guests(&mut tx, id).await?;
        tx.commit().await?;
        Ok(HostingPlaces {
            total_beds: hosting.available_beds,
            accepted_guests: accepted,
        })
    }

    /// Creates a pending hosting request. The hosting row lock covers
    /// the capacity check; the event row lock serializes the
    /// event-scoped uniqueness check across sibling hostings.
    pub async fn create_request(
        &self,
        hosting_id: Uuid,
        requester_id: Uuid,
        message: Option<String>,
    ) -> Result<EventHostingRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let hosting = lock_hosting(&mut tx, hosting_id).await?;
        if !hosting.is_active {
            return Err(DomainError::invalid_state(
                "hosting",
                "this hosting is no longer active",
            )
            .into());
        }

        lock_event(&mut tx, hosting.event_id).await?;
        let accepted = accepted_guests(&mut tx, hosting_id).await?;
        let existing =
            live_request_for_event(&mut tx, hosting.event_id, requester_id, None).await?;
        let capacity = CapacityView::new(i64::from(hosting.available_beds), accepted);
        lifecycle::validate_create(hosting.host_id, requester_id, &capacity, 1, existing)?;

        let mut request = EventHostingRequest::new(hosting_id, requester_id);
        request.message = message;

        sqlx::query(
            r#"
            INSERT INTO event_hosting_requests
                (id, hosting_id, requester_id, status, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(request.id)
        .bind(request.hosting_id)
        .bind(request.requester_id)
        .bind(request.status.as_str())
        .bind(&request.message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    pub async fn apply_request_action(
        &self,
        id: Uuid,
        actor: Uuid,
        action: RequestAction,
        host_message: Option<String>,
    ) -> Result<EventHostingRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let hosting_id: Uuid =
            sqlx::query_scalar("SELECT hosting_id FROM event_hosting_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound("hosting request"))?;

        let hosting = lock_hosting(&mut tx, hosting_id).await?;

        let row = sqlx::query_as::<_, HostingRequestRow>(
            "SELECT * FROM event_hosting_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("hosting request"))?;
        let request = row.into_model()?;

        let accepted = accepted_guests(&mut tx, hosting_id).await?;
        let snapshot = RequestSnapshot {
            owner: hosting.host_id,
            requester: request.requester_id,
            status: request.status,
            units: 1,
        };
        let capacity = CapacityView::new(i64::from(hosting.available_beds), accepted);
        let next = lifecycle::apply_action(&snapshot, actor, action, &capacity)?;

        let row = sqlx::query_as::<_, HostingRequestRow>(
            r#"
            UPDATE event_hosting_requests
            SET status = $2,
                host_message = COALESCE($3, host_message),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(&host_message)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    pub async fn get_request(&self, id: Uuid) -> Result<Option<EventHostingRequest>, StoreError> {
        let row = sqlx::query_as::<_, HostingRequestRow>(
            "SELECT * FROM event_hosting_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(HostingRequestRow::into_model).transpose()
    }

    /// The host of the hosting a request targets, for the API's
    /// authorization predicate.
    pub async fn host_of_request(&self, id: Uuid) -> Result<Uuid, StoreError> {
        sqlx::query_scalar(
            "SELECT h.host_id FROM event_hosting_requests hr
             JOIN event_hostings h ON h.id = hr.hosting_id
             WHERE hr.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("hosting request"))
    }

    /// Hosting requests visible to a user: their own, or those against
    /// their hostings. Staff see everything.
    pub async fn list_visible_requests(
        &self,
        user_id: Uuid,
        is_staff: bool,
        filter: &HostingRequestFilter,
    ) -> Result<Vec<EventHostingRequest>, StoreError> {
        let rows = sqlx::query_as::<_, HostingRequestRow>(
            r#"
            SELECT hr.* FROM event_hosting_requests hr
            JOIN event_hostings h ON h.id = hr.hosting_id
            WHERE (hr.requester_id = $1 OR h.host_id = $1 OR $2)
              AND ($3::uuid IS NULL OR hr.hosting_id = $3)
              AND ($4::uuid IS NULL OR hr.requester_id = $4)
              AND ($5::text IS NULL OR hr.status = $5)
            ORDER BY hr.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(is_staff)
        .bind(filter.hosting_id)
        .bind(filter.requester_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HostingRequestRow::into_model).collect()
    }

    pub async fn list_requests_by_requester(
        &self,
        requester_id: Uuid,
    ) -> Result<Vec<EventHostingRequest>, StoreError> {
        let rows = sqlx::query_as::<_, HostingRequestRow>(
            "SELECT * FROM event_hosting_requests WHERE requester_id = $1
             ORDER BY created_at DESC",
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HostingRequestRow::into_model).collect()
    }

    pub async fn list_requests_for_host(
        &self,
        host_id: Uuid,
    ) -> Result<Vec<EventHostingRequest>, StoreError> {
        let rows = sqlx::query_as::<_, HostingRequestRow>(
            "SELECT hr.* FROM event_hosting_requests hr
             JOIN event_hostings h ON h.id = hr.hosting_id
             WHERE h.host_id = $1
             ORDER BY hr.created_at DESC",
        )
        .bind(host_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HostingRequestRow::into_model).collect()
    }
}
