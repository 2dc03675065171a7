use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tocarde_core::models::CarpoolTrip;
use tocarde_core::DomainError;
use tocarde_store::trip_repo::{TripFilter, TripWithSeats};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/carpool/trips", get(list_trips).post(create_trip))
        .route(
            "/v1/carpool/trips/{id}",
            get(get_trip).put(update_trip).delete(delete_trip),
        )
}

#[derive(Debug, Deserialize)]
struct TripListQuery {
    event: Option<Uuid>,
    driver: Option<Uuid>,
    departure_city: Option<String>,
    arrival_city: Option<String>,
    is_active: Option<bool>,
    has_seats: Option<bool>,
    departure_after: Option<DateTime<Utc>>,
    departure_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TripPayload {
    event_id: Option<Uuid>,
    departure_city: String,
    departure_address: Option<String>,
    arrival_city: String,
    arrival_address: Option<String>,
    departure_datetime: DateTime<Utc>,
    return_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    has_return: bool,
    #[serde(default = "default_seats")]
    seats_total: i32,
    #[serde(default)]
    price_per_seat_cents: i64,
    additional_info: Option<String>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_seats() -> i32 {
    3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct TripResponse {
    trip: CarpoolTrip,
    seats_available: i64,
    is_full: bool,
}

impl From<TripWithSeats> for TripResponse {
    fn from(t: TripWithSeats) -> Self {
        let seats_available = t.seats_available();
        Self {
            trip: t.trip,
            seats_available,
            is_full: seats_available <= 0,
        }
    }
}

fn can_edit(user: &CurrentUser, trip: &CarpoolTrip) -> Result<(), ApiError> {
    if user.id != trip.driver_id && !user.is_staff {
        return Err(DomainError::forbidden("trip", "only the driver can modify this trip").into());
    }
    Ok(())
}

async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<TripListQuery>,
) -> Result<Json<Vec<TripResponse>>, ApiError> {
    let filter = TripFilter {
        event_id: query.event,
        driver_id: query.driver,
        departure_city: query.departure_city,
        arrival_city: query.arrival_city,
        is_active: query.is_active,
        has_seats: query.has_seats.unwrap_or(false),
        departure_after: query.departure_after,
        departure_before: query.departure_before,
    };
    let trips = state.trips.list(&filter).await?;
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<TripPayload>,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    if payload.seats_total < 0 {
        return Err(
            DomainError::invalid_state("seats_total", "seat count must not be negative").into(),
        );
    }

    let now = Utc::now();
    let trip = CarpoolTrip {
        id: Uuid::new_v4(),
        driver_id: user.id,
        event_id: payload.event_id,
        departure_city: payload.departure_city,
        departure_address: payload.departure_address,
        arrival_city: payload.arrival_city,
        arrival_address: payload.arrival_address,
        departure_datetime: payload.departure_datetime,
        return_datetime: payload.return_datetime,
        has_return: payload.has_return,
        seats_total: payload.seats_total,
        price_per_seat_cents: payload.price_per_seat_cents,
        additional_info: payload.additional_info,
        is_active: payload.is_active,
        created_at: now,
        updated_at: now,
    };
    state.trips.create(&trip).await?;

    tracing::info!(trip_id = %trip.id, driver_id = %user.id, "carpool trip created");

    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            trip,
            seats_available: i64::from(payload.seats_total),
            is_full: payload.seats_total == 0,
        }),
    ))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripResponse>, ApiError> {
    let trip = state.trips.get(id).await?.ok_or(ApiError::NotFound("trip"))?;
    Ok(Json(trip.into()))
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TripPayload>,
) -> Result<Json<TripResponse>, ApiError> {
    let existing = state.trips.get(id).await?.ok_or(ApiError::NotFound("trip"))?;
    can_edit(&user, &existing.trip)?;

    if payload.seats_total < 0 {
        return Err(
            DomainError::invalid_state("seats_total", "seat count must not be negative").into(),
        );
    }

    let mut trip = existing.trip;
    trip.event_id = payload.event_id;
    trip.departure_city = payload.departure_city;
    trip.departure_address = payload.departure_address;
    trip.arrival_city = payload.arrival_city;
    trip.arrival_address = payload.arrival_address;
    trip.departure_datetime = payload.departure_datetime;
    trip.return_datetime = payload.return_datetime;
    trip.has_return = payload.has_return;
    trip.seats_total = payload.seats_total;
    trip.price_per_seat_cents = payload.price_per_seat_cents;
    trip.additional_info = payload.additional_info;
    trip.is_active = payload.is_active;

    let updated = state.trips.update(&trip).await?;
    let with_seats = TripWithSeats {
        seats_accepted: existing.seats_accepted,
        trip: updated,
    };
    Ok(Json(with_seats.into()))
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existing = state.trips.get(id).await?.ok_or(ApiError::NotFound("trip"))?;
    can_edit(&user, &existing.trip)?;

    state.trips.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
