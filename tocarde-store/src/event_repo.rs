use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use tocarde_core::models::{Event, EventSubscription, SubscriptionAnswer};

use crate::error::StoreError;

#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    location: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    url_signup: Option<String>,
    url_website: Option<String>,
    prices: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_model(self) -> Event {
        Event {
            id: self.id,
            name: self.name,
            description: self.description,
            location: self.location,
            start_date: self.start_date,
            end_date: self.end_date,
            url_signup: self.url_signup,
            url_website: self.url_website,
            prices: self.prices,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    answer: String,
    can_invite: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    fn into_model(self) -> Result<EventSubscription, StoreError> {
        let answer = SubscriptionAnswer::from_str(&self.answer).map_err(StoreError::Decode)?;
        Ok(EventSubscription {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            answer,
            can_invite: self.can_invite,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events
                (id, name, description, location, start_date, end_date,
                 url_signup, url_website, prices, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(&event.url_signup)
        .bind(&event.url_website)
        .bind(&event.prices)
        .bind(event.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(EventRow::into_model))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM events
             WHERE is_active OR $1
             ORDER BY start_date",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EventRow::into_model).collect())
    }

    pub async fn update(&self, event: &Event) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            UPDATE events SET
                name = $2, description = $3, location = $4, start_date = $5,
                end_date = $6, url_signup = $7, url_website = $8, prices = $9,
                is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(&event.url_signup)
        .bind(&event.url_website)
        .bind(&event.prices)
        .bind(event.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("event"))?;
        Ok(row.into_model())
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE events SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("event"));
        }
        Ok(())
    }

    /// Upserts the caller's subscription: re-subscribing updates the
    /// existing (event, user) record instead of creating a duplicate.
    pub async fn subscribe(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        answer: SubscriptionAnswer,
        can_invite: bool,
    ) -> Result<EventSubscription, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO event_subscriptions (id, event_id, user_id, answer, can_invite)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id, user_id) DO UPDATE
                SET answer = EXCLUDED.answer, can_invite = EXCLUDED.can_invite,
                    is_active = TRUE, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(user_id)
        .bind(answer.as_str())
        .bind(can_invite)
        .fetch_one(&self.pool)
        .await?;
        row.into_model()
    }

    pub async fn list_subscriptions(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<EventSubscription>, StoreError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT * FROM event_subscriptions
             WHERE event_id = $1 AND is_active
             ORDER BY created_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SubscriptionRow::into_model).collect()
    }
}
