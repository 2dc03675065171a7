use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tocarde_core::models::{EventHosting, EventHostingRequest, RequestAction, RequestStatus};
use tocarde_core::DomainError;
use tocarde_store::hosting_repo::{HostingFilter, HostingRequestFilter};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/hostings", get(list_hostings).post(create_hosting))
        .route(
            "/v1/hostings/{id}",
            get(get_hosting).put(update_hosting).delete(delete_hosting),
        )
        .route("/v1/hostings/{id}/available-places", get(available_places))
        .route(
            "/v1/hosting-requests",
            get(list_hosting_requests).post(create_hosting_request),
        )
        .route("/v1/hosting-requests/mine", get(my_hosting_requests))
        .route(
            "/v1/hosting-requests/for-my-hostings",
            get(requests_for_my_hostings),
        )
        .route("/v1/hosting-requests/{id}", get(get_hosting_request))
        .route("/v1/hosting-requests/{id}/accept", post(accept_request))
        .route("/v1/hosting-requests/{id}/reject", post(reject_request))
        .route("/v1/hosting-requests/{id}/cancel", post(cancel_request))
}

#[derive(Debug, Deserialize)]
struct HostingListQuery {
    event: Option<Uuid>,
    host: Option<Uuid>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HostingPayload {
    event_id: Uuid,
    #[serde(default = "default_beds")]
    available_beds: i32,
    custom_rules: Option<String>,
    address_override: Option<String>,
    city_override: Option<String>,
    zip_code_override: Option<String>,
    country_override: Option<String>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_beds() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct AvailablePlacesResponse {
    total_beds: i32,
    accepted_guests: i64,
    available_places: i64,
}

#[derive(Debug, Deserialize)]
struct HostingRequestListQuery {
    hosting: Option<Uuid>,
    requester: Option<Uuid>,
    status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
struct CreateHostingRequestPayload {
    hosting_id: Uuid,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RequestActionPayload {
    host_message: Option<String>,
}

fn can_edit(user: &CurrentUser, hosting: &EventHosting) -> Result<(), ApiError> {
    if user.id != hosting.host_id && !user.is_staff {
        return Err(
            DomainError::forbidden("hosting", "only the host can modify this hosting").into(),
        );
    }
    Ok(())
}

async fn list_hostings(
    State(state): State<AppState>,
    Query(query): Query<HostingListQuery>,
) -> Result<Json<Vec<EventHosting>>, ApiError> {
    let filter = HostingFilter {
        event_id: query.event,
        host_id: query.host,
        is_active: query.is_active,
    };
    Ok(Json(state.hostings.list(&filter).await?))
}

async fn create_hosting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<HostingPayload>,
) -> Result<(StatusCode, Json<EventHosting>), ApiError> {
    if payload.available_beds < 0 {
        return Err(
            DomainError::invalid_state("available_beds", "bed count must not be negative").into(),
        );
    }

    let now = Utc::now();
    let hosting = EventHosting {
        id: Uuid::new_v4(),
        event_id: payload.event_id,
        host_id: user.id,
        available_beds: payload.available_beds,
        custom_rules: payload.custom_rules,
        address_override: payload.address_override,
        city_override: payload.city_override,
        zip_code_override: payload.zip_code_override,
        country_override: payload.country_override,
        is_active: payload.is_active,
        created_at: now,
        updated_at: now,
    };
    state.hostings.create(&hosting).await?;

    tracing::info!(hosting_id = %hosting.id, host_id = %user.id, "hosting created");
    Ok((StatusCode::CREATED, Json(hosting)))
}

async fn get_hosting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventHosting>, ApiError> {
    let hosting = state.hostings.get(id).await?.ok_or(ApiError::NotFound("hosting"))?;
    Ok(Json(hosting))
}

async fn update_hosting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<HostingPayload>,
) -> Result<Json<EventHosting>, ApiError> {
    let mut hosting = state.hostings.get(id).await?.ok_or(ApiError::NotFound("hosting"))?;
    can_edit(&user, &hosting)?;

    if payload.available_beds < 0 {
        return Err(
            DomainError::invalid_state("available_beds", "bed count must not be negative").into(),
        );
    }

    hosting.available_beds = payload.available_beds;
    hosting.custom_rules = payload.custom_rules;
    hosting.address_override = payload.address_override;
    hosting.city_override = payload.city_override;
    hosting.zip_code_override = payload.zip_code_override;
    hosting.country_override = payload.country_override;
    hosting.is_active = payload.is_active;

    let updated = state.hostings.update(&hosting).await?;
    Ok(Json(updated))
}

async fn delete_hosting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let hosting = state.hostings.get(id).await?.ok_or(ApiError::NotFound("hosting"))?;
    can_edit(&user, &hosting)?;

    state.hostings.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn available_places(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AvailablePlacesResponse>, ApiError> {
    let places = state.hostings.places(id).await?;
    Ok(Json(AvailablePlacesResponse {
        total_beds: places.total_beds,
        accepted_guests: places.accepted_guests,
        available_places: places.available(),
    }))
}

async fn list_hosting_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<HostingRequestListQuery>,
) -> Result<Json<Vec<EventHostingRequest>>, ApiError> {
    let filter = HostingRequestFilter {
        hosting_id: query.hosting,
        requester_id: query.requester,
        status: query.status,
    };
    let requests = state
        .hostings
        .list_visible_requests(user.id, user.is_staff, &filter)
        .await?;
    Ok(Json(requests))
}

async fn create_hosting_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateHostingRequestPayload>,
) -> Result<(StatusCode, Json<EventHostingRequest>), ApiError> {
    let request = state
        .hostings
        .create_request(payload.hosting_id, user.id, payload.message)
        .await?;

    tracing::info!(
        request_id = %request.id,
        hosting_id = %request.hosting_id,
        requester_id = %user.id,
        "hosting request created"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

async fn my_hosting_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<EventHostingRequest>>, ApiError> {
    Ok(Json(state.hostings.list_requests_by_requester(user.id).await?))
}

async fn requests_for_my_hostings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<EventHostingRequest>>, ApiError> {
    Ok(Json(state.hostings.list_requests_for_host(user.id).await?))
}

async fn get_hosting_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventHostingRequest>, ApiError> {
    let request = state
        .hostings
        .get_request(id)
        .await?
        .ok_or(ApiError::NotFound("hosting request"))?;

    if !user.is_staff && user.id != request.requester_id {
        let host = state.hostings.host_of_request(id).await?;
        if user.id != host {
            return Err(ApiError::NotFound("hosting request"));
        }
    }
    Ok(Json(request))
}

async fn transition(
    state: AppState,
    user: CurrentUser,
    id: Uuid,
    action: RequestAction,
    payload: Option<RequestActionPayload>,
) -> Result<Json<EventHostingRequest>, ApiError> {
    let host_message = payload.unwrap_or_default().host_message;
    let request = state
        .hostings
        .apply_request_action(id, user.id, action, host_message)
        .await?;

    tracing::info!(
        request_id = %request.id,
        actor_id = %user.id,
        status = request.status.as_str(),
        "hosting request transitioned"
    );
    Ok(Json(request))
}

async fn accept_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RequestActionPayload>>,
) -> Result<Json<EventHostingRequest>, ApiError> {
    transition(state, user, id, RequestAction::Accept, payload.map(|Json(p)| p)).await
}

async fn reject_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RequestActionPayload>>,
) -> Result<Json<EventHostingRequest>, ApiError> {
    transition(state, user, id, RequestAction::Reject, payload.map(|Json(p)| p)).await
}

async fn cancel_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RequestActionPayload>>,
) -> Result<Json<EventHostingRequest>, ApiError> {
    transition(state, user, id, RequestAction::Cancel, payload.map(|Json(p)| p)).await
}
