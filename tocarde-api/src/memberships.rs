use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tocarde_core::membership;
use tocarde_core::models::Membership;
use tocarde_core::DomainError;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/memberships", get(list_memberships).post(create_membership))
        .route(
            "/v1/memberships/{id}",
            get(get_membership).put(update_membership),
        )
}

#[derive(Debug, Deserialize)]
struct MembershipListQuery {
    user: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct MembershipPayload {
    /// Staff may create a period for another member; everyone else gets
    /// their own user id regardless of what they send.
    user_id: Option<Uuid>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

fn target_user(user: &CurrentUser, requested: Option<Uuid>) -> Result<Uuid, ApiError> {
    match requested {
        Some(other) if other != user.id => {
            if !user.is_staff {
                return Err(DomainError::forbidden(
                    "user_id",
                    "only staff can manage memberships for other members",
                )
                .into());
            }
            Ok(other)
        }
        _ => Ok(user.id),
    }
}

async fn list_memberships(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<MembershipListQuery>,
) -> Result<Json<Vec<Membership>>, ApiError> {
    let scope = if user.is_staff {
        query.user
    } else {
        Some(user.id)
    };
    Ok(Json(state.memberships.list(scope).await?))
}

async fn create_membership(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<MembershipPayload>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    let user_id = target_user(&user, payload.user_id)?;
    membership::validate_period(payload.start_date, payload.end_date)?;

    let mut candidate = Membership::new(user_id, payload.start_date, payload.end_date);
    candidate.is_active = payload.is_active;
    let created = state.memberships.create(&candidate).await?;

    tracing::info!(membership_id = %created.id, user_id = %user_id, "membership created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_membership(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Membership>, ApiError> {
    let membership = state
        .memberships
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("membership"))?;
    if membership.user_id != user.id && !user.is_staff {
        return Err(ApiError::NotFound("membership"));
    }
    Ok(Json(membership))
}

async fn update_membership(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MembershipPayload>,
) -> Result<Json<Membership>, ApiError> {
    let existing = state
        .memberships
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("membership"))?;
    if existing.user_id != user.id && !user.is_staff {
        return Err(ApiError::NotFound("membership"));
    }
    membership::validate_period(payload.start_date, payload.end_date)?;

    let updated = state
        .memberships
        .update(id, payload.start_date, payload.end_date, payload.is_active)
        .await?;
    Ok(Json(updated))
}
