use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tocarde_core::membership::{self, ActivePeriod};
use tocarde_core::models::Membership;

use crate::error::StoreError;

#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    fn into_model(self) -> Membership {
        Membership {
            id: self.id,
            user_id: self.user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn user_lock_key(user_id: Uuid) -> i64 {
    let (hi, lo) = user_id.as_u64_pair();
    (hi ^ lo) as i64
}

/// Takes a transaction-scoped advisory lock keyed on the user. Row
/// locks cannot serialize two overlap checks when the user has no
/// conflicting rows yet, so the lock must live outside the table.
async fn lock_user(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_lock_key(user_id))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The user's active periods for the overlap check. Callers must hold
/// the user's advisory lock.
async fn active_periods(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Vec<ActivePeriod>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct PeriodRow {
        id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, PeriodRow>(
        "SELECT id, start_date, end_date FROM memberships
         WHERE user_id = $1 AND is_active",
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ActivePeriod {
            id: r.id,
            start_date: r.start_date,
            end_date: r.end_date,
        })
        .collect())
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, membership: &Membership) -> Result<Membership, StoreError> {
        let mut tx = self.pool.begin().await?;

        if membership.is_active {
            lock_user(&mut tx, membership.user_id).await?;
            let existing = active_periods(&mut tx, membership.user_id).await?;
            membership::ensure_no_overlap(
                &existing,
                membership.start_date,
                membership.end_date,
                None,
            )?;
        }

        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            INSERT INTO memberships (id, user_id, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(membership.id)
        .bind(membership.user_id)
        .bind(membership.start_date)
        .bind(membership.end_date)
        .bind(membership.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_model())
    }

    pub async fn update(
        &self,
        id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        is_active: bool,
    ) -> Result<Membership, StoreError> {
        let mut tx = self.pool.begin().await?;

        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM memberships WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("membership"))?;

        // Inactive periods are exempt from the overlap rule.
        if is_active {
            lock_user(&mut tx, user_id).await?;
            let existing = active_periods(&mut tx, user_id).await?;
            membership::ensure_no_overlap(&existing, start_date, end_date, Some(id))?;
        }

        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            UPDATE memberships
            SET start_date = $2, end_date = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(start_date)
        .bind(end_date)
        .bind(is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_model())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, MembershipRow>("SELECT * FROM memberships WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MembershipRow::into_model))
    }

    pub async fn list(&self, user_id: Option<Uuid>) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            "SELECT * FROM memberships
             WHERE ($1::uuid IS NULL OR user_id = $1)
             ORDER BY start_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MembershipRow::into_model).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sessions only serialize when they derive the same advisory key
    // from the same user id.
    #[test]
    fn test_user_lock_key_is_stable_per_user() {
        let user = Uuid::parse_str("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8").unwrap();
        assert_eq!(user_lock_key(user), user_lock_key(user));

        let other = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        assert_ne!(user_lock_key(user), user_lock_key(other));
    }
}
