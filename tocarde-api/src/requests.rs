use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tocarde_core::models::{CarpoolPayment, CarpoolRequest, PaymentMethod, RequestAction, RequestStatus};
use tocarde_core::{payment, DomainError};
use tocarde_store::request_repo::RequestFilter;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/carpool/requests", get(list_requests).post(create_request))
        .route("/v1/carpool/requests/{id}", get(get_request))
        .route("/v1/carpool/requests/{id}/action", post(apply_action))
        .route(
            "/v1/carpool/requests/{id}/payments",
            get(list_payments).post(record_payment),
        )
}

#[derive(Debug, Deserialize)]
struct RequestListQuery {
    trip: Option<Uuid>,
    passenger: Option<Uuid>,
    status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
struct CreateRequestPayload {
    trip_id: Uuid,
    #[serde(default = "default_seats")]
    seats_requested: i32,
    message: Option<String>,
}

fn default_seats() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct ActionPayload {
    action: RequestAction,
    response_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentPayload {
    amount_cents: i64,
    payment_method: PaymentMethod,
    #[serde(default = "default_completed")]
    is_completed: bool,
    notes: Option<String>,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct RequestResponse {
    #[serde(flatten)]
    request: CarpoolRequest,
    expected_amount_cents: i64,
    total_paid_cents: i64,
    is_paid: bool,
}

async fn with_payment_summary(
    state: &AppState,
    request: CarpoolRequest,
) -> Result<RequestResponse, ApiError> {
    let trip = state
        .trips
        .get(request.trip_id)
        .await?
        .ok_or(ApiError::NotFound("trip"))?;
    let payments = state.payments.list_for_request(request.id).await?;

    let expected = payment::expected_amount_cents(
        trip.trip.price_per_seat_cents,
        request.seats_requested,
    );
    let paid = payment::total_paid_cents(&payments);
    Ok(RequestResponse {
        is_paid: payment::is_paid(&payments),
        expected_amount_cents: expected,
        total_paid_cents: paid,
        request,
    })
}

/// Visibility check shared by the single-request endpoints. The
/// passenger, the trip driver, and staff may see a request; everyone
/// else gets a 404 so the endpoint does not leak request ids.
async fn ensure_visible(
    state: &AppState,
    user: &CurrentUser,
    request: &CarpoolRequest,
) -> Result<(), ApiError> {
    if user.is_staff || user.id == request.passenger_id {
        return Ok(());
    }
    let driver = state.requests.driver_of(request.id).await?;
    if user.id == driver {
        return Ok(());
    }
    Err(ApiError::NotFound("request"))
}

async fn list_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<CarpoolRequest>>, ApiError> {
    let filter = RequestFilter {
        trip_id: query.trip,
        passenger_id: query.passenger,
        status: query.status,
    };
    let requests = state
        .requests
        .list_visible(user.id, user.is_staff, &filter)
        .await?;
    Ok(Json(requests))
}

async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<(StatusCode, Json<CarpoolRequest>), ApiError> {
    if payload.seats_requested < 1 {
        return Err(DomainError::invalid_state(
            "seats_requested",
            "at least one seat must be requested",
        )
        .into());
    }

    let request = state
        .requests
        .create(payload.trip_id, user.id, payload.seats_requested, payload.message)
        .await?;

    tracing::info!(
        request_id = %request.id,
        trip_id = %request.trip_id,
        passenger_id = %user.id,
        "carpool request created"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

async fn get_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestResponse>, ApiError> {
    let request = state.requests.get(id).await?.ok_or(ApiError::NotFound("request"))?;
    ensure_visible(&state, &user, &request).await?;
    Ok(Json(with_payment_summary(&state, request).await?))
}

async fn apply_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActionPayload>,
) -> Result<Json<CarpoolRequest>, ApiError> {
    let request = state
        .requests
        .apply_action(id, user.id, payload.action, payload.response_message)
        .await?;

    tracing::info!(
        request_id = %request.id,
        actor_id = %user.id,
        status = request.status.as_str(),
        "carpool request transitioned"
    );
    Ok(Json(request))
}

async fn list_payments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CarpoolPayment>>, ApiError> {
    let request = state.requests.get(id).await?.ok_or(ApiError::NotFound("request"))?;
    ensure_visible(&state, &user, &request).await?;

    let payments = state.payments.list_for_request(id).await?;
    Ok(Json(payments))
}

async fn record_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentPayload>,
) -> Result<(StatusCode, Json<CarpoolPayment>), ApiError> {
    if payload.amount_cents < 0 {
        return Err(
            DomainError::invalid_state("amount_cents", "amount must not be negative").into(),
        );
    }

    let recorded = state
        .payments
        .record(
            id,
            user.id,
            payload.amount_cents,
            payload.payment_method,
            payload.is_completed,
            payload.notes,
        )
        .await?;

    tracing::info!(
        request_id = %id,
        payment_id = %recorded.id,
        amount_cents = recorded.amount_cents,
        "payment recorded"
    );
    Ok((StatusCode::CREATED, Json(recorded)))
}
