use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tocarde_core::models::{Event, EventSubscription, SubscriptionAnswer};
use tocarde_core::DomainError;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events", get(list_events).post(create_event))
        .route(
            "/v1/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/v1/events/{id}/subscribe", post(subscribe))
        .route("/v1/events/{id}/subscriptions", get(list_subscriptions))
}

#[derive(Debug, Deserialize)]
struct EventListQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    name: String,
    description: Option<String>,
    location: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    url_signup: Option<String>,
    url_website: Option<String>,
    prices: Option<String>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SubscribePayload {
    answer: SubscriptionAnswer,
    #[serde(default)]
    can_invite: bool,
}

fn ensure_staff(user: &CurrentUser) -> Result<(), ApiError> {
    if !user.is_staff {
        return Err(DomainError::forbidden("event", "only staff can manage events").into());
    }
    Ok(())
}

async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    // Inactive events stay staff-only.
    let include_inactive = query.include_inactive && user.is_staff;
    Ok(Json(state.events.list(include_inactive).await?))
}

async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<EventPayload>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    ensure_staff(&user)?;
    if payload.end_date < payload.start_date {
        return Err(
            DomainError::invalid_state("end_date", "end date must not precede start date").into(),
        );
    }

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        location: payload.location,
        start_date: payload.start_date,
        end_date: payload.end_date,
        url_signup: payload.url_signup,
        url_website: payload.url_website,
        prices: payload.prices,
        is_active: payload.is_active,
        created_at: now,
        updated_at: now,
    };
    state.events.create(&event).await?;

    tracing::info!(event_id = %event.id, name = %event.name, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    let event = state.events.get(id).await?.ok_or(ApiError::NotFound("event"))?;
    if !event.is_active && !user.is_staff {
        return Err(ApiError::NotFound("event"));
    }
    Ok(Json(event))
}

async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventPayload>,
) -> Result<Json<Event>, ApiError> {
    ensure_staff(&user)?;
    if payload.end_date < payload.start_date {
        return Err(
            DomainError::invalid_state("end_date", "end date must not precede start date").into(),
        );
    }

    let mut event = state.events.get(id).await?.ok_or(ApiError::NotFound("event"))?;
    event.name = payload.name;
    event.description = payload.description;
    event.location = payload.location;
    event.start_date = payload.start_date;
    event.end_date = payload.end_date;
    event.url_signup = payload.url_signup;
    event.url_website = payload.url_website;
    event.prices = payload.prices;
    event.is_active = payload.is_active;

    let updated = state.events.update(&event).await?;
    Ok(Json(updated))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ensure_staff(&user)?;
    state.events.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subscribe(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubscribePayload>,
) -> Result<Json<EventSubscription>, ApiError> {
    let event = state.events.get(id).await?.ok_or(ApiError::NotFound("event"))?;
    if !event.is_active {
        return Err(
            DomainError::invalid_state("event", "this event is no longer active").into(),
        );
    }

    let subscription = state
        .events
        .subscribe(id, user.id, payload.answer, payload.can_invite)
        .await?;
    tracing::info!(
        event_id = %id,
        user_id = %user.id,
        answer = subscription.answer.as_str(),
        "event subscription recorded"
    );
    Ok(Json(subscription))
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EventSubscription>>, ApiError> {
    state.events.get(id).await?.ok_or(ApiError::NotFound("event"))?;
    Ok(Json(state.events.list_subscriptions(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_payload_carries_can_invite() {
        let payload: SubscribePayload =
            serde_json::from_value(serde_json::json!({ "answer": "YES" })).unwrap();
        assert_eq!(payload.answer, SubscriptionAnswer::Yes);
        assert!(!payload.can_invite);

        let payload: SubscribePayload = serde_json::from_value(serde_json::json!({
            "answer": "MAYBE",
            "can_invite": true,
        }))
        .unwrap();
        assert_eq!(payload.answer, SubscriptionAnswer::Maybe);
        assert!(payload.can_invite);
    }
}
