use super::extract::{ApiJson, ApiPath, OptionalJson};
use super::AppState;
use crate::error::AppError;
use crate::models::{
    Event, EventStatus, NewEvent, Principal, ReconcileReport, Registration, RegistrationReceipt,
    RegistrationUpdate, RemovedRegistration,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventCapacityRequest {
    pub max_spots: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// Defaults to the calling player
    #[serde(default)]
    pub player_id: Option<Uuid>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_event(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<NewEvent>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = state.registrations.create_event(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<AppState>,
    _principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.registrations.get_event(event_id).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registrations.delete_event(&principal, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_event_status(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateEventStatusRequest>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .registrations
        .update_event_status(&principal, event_id, request.status)
        .await?;
    Ok(Json(event))
}

pub async fn update_event_capacity(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateEventCapacityRequest>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .registrations
        .update_event_capacity(&principal, event_id, request.max_spots)
        .await?;
    Ok(Json(event))
}

pub async fn reconcile_event(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Json<ReconcileReport>, AppError> {
    Ok(Json(state.registrations.reconcile_event(&principal, event_id).await?))
}

pub async fn list_registrations(
    State(state): State<AppState>,
    _principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Json<Vec<Registration>>, AppError> {
    Ok(Json(state.registrations.list_registrations(event_id).await?))
}

pub async fn register(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(event_id): ApiPath<Uuid>,
    OptionalJson(request): OptionalJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationReceipt>), AppError> {
    let player_id = request.player_id.unwrap_or(principal.id);

    let receipt = state
        .registrations
        .register(&principal, event_id, player_id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_registration(
    State(state): State<AppState>,
    _principal: Principal,
    ApiPath(registration_id): ApiPath<Uuid>,
) -> Result<Json<Registration>, AppError> {
    Ok(Json(state.registrations.get_registration(registration_id).await?))
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(registration_id): ApiPath<Uuid>,
) -> Result<Json<Registration>, AppError> {
    let registration = state
        .registrations
        .cancel_registration(&principal, registration_id)
        .await?;
    Ok(Json(registration))
}

pub async fn update_registration(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(registration_id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<RegistrationUpdate>,
) -> Result<Json<Registration>, AppError> {
    let registration = state
        .registrations
        .update_registration_status(&principal, registration_id, update)
        .await?;
    Ok(Json(registration))
}

pub async fn remove_registration(
    State(state): State<AppState>,
    principal: Principal,
    ApiPath(registration_id): ApiPath<Uuid>,
) -> Result<Json<RemovedRegistration>, AppError> {
    let removed = state
        .registrations
        .remove_registration(&principal, registration_id)
        .await?;
    Ok(Json(removed))
}
