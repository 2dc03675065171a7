use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use tocarde_core::models::{CarpoolPayment, PaymentMethod, RequestStatus};
use tocarde_core::payment;

use crate::error::StoreError;

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    request_id: Uuid,
    amount_cents: i64,
    is_completed: bool,
    payment_method: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_model(self) -> Result<CarpoolPayment, StoreError> {
        let payment_method =
            PaymentMethod::from_str(&self.payment_method).map_err(StoreError::Decode)?;
        Ok(CarpoolPayment {
            id: self.id,
            request_id: self.request_id,
            amount_cents: self.amount_cents,
            is_completed: self.is_completed,
            payment_method,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RequestContextRow {
    status: String,
    driver_id: Uuid,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a payment against an accepted request. A completed
    /// payment replaces any existing completed one in place, so marking
    /// a request as paid is idempotent.
    pub async fn record(
        &self,
        request_id: Uuid,
        actor: Uuid,
        amount_cents: i64,
        payment_method: PaymentMethod,
        is_completed: bool,
        notes: Option<String>,
    ) -> Result<CarpoolPayment, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the request row so a concurrent cancel cannot slip
        // between the status check and the insert.
        let ctx = sqlx::query_as::<_, RequestContextRow>(
            "SELECT r.status, t.driver_id FROM carpool_requests r
             JOIN carpool_trips t ON t.id = r.trip_id
             WHERE r.id = $1
             FOR UPDATE OF r",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("request"))?;

        let status = RequestStatus::from_str(&ctx.status).map_err(StoreError::Decode)?;
        payment::validate_record(actor, ctx.driver_id, status)?;

        let existing_completed: Option<Uuid> = if is_completed {
            sqlx::query_scalar(
                "SELECT id FROM carpool_payments WHERE request_id = $1 AND is_completed LIMIT 1",
            )
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
        } else {
            None
        };

        let row = if let Some(payment_id) = existing_completed {
            sqlx::query_as::<_, PaymentRow>(
                r#"
                UPDATE carpool_payments
                SET amount_cents = $2, payment_method = $3, notes = $4, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(payment_id)
            .bind(amount_cents)
            .bind(payment_method.as_str())
            .bind(&notes)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, PaymentRow>(
                r#"
                INSERT INTO carpool_payments
                    (id, request_id, amount_cents, is_completed, payment_method, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(request_id)
            .bind(amount_cents)
            .bind(is_completed)
            .bind(payment_method.as_str())
            .bind(&notes)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        row.into_model()
    }

    pub async fn list_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<CarpoolPayment>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM carpool_payments WHERE request_id = $1 ORDER BY created_at DESC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentRow::into_model).collect()
    }
}
