use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Router,
};
use fleetbook_booking::{BookingDetails, BookingSummary, CreateBookingRequest, ReturnInitiated, ReturnReceipt};
use fleetbook_core::{Booking, BookingError, Page, Role};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::middleware::AuthActor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 { 1 }
fn default_limit() -> i64 { 10 }

#[derive(Debug, Deserialize)]
pub struct OtpBody {
    pub otp: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/seeker", get(seeker_bookings))
        .route("/v1/bookings/host", get(host_bookings))
        .route("/v1/bookings/{id}", get(booking_details))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/pickup", post(confirm_pickup))
        .route("/v1/bookings/{id}/return/initiate", post(initiate_return))
        .route("/v1/bookings/{id}/return", post(confirm_return))
}

async fn create_booking(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let req = extract_json(body)?;
    let booking = state.bookings.create_booking(&actor, req).await?;
    info!(booking_id = %booking.id, "Booking created via API");
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn seeker_bookings(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<BookingSummary>>, AppError> {
    let params = extract_query(params)?;
    let page = state.queries.seeker_bookings(&actor, params.page, params.limit).await?;
    Ok(Json(page))
}

async fn host_bookings(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<BookingSummary>>, AppError> {
    let params = extract_query(params)?;
    let page = state.queries.host_bookings(&actor, params.page, params.limit).await?;
    Ok(Json(page))
}

async fn booking_details(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetails>, AppError> {
    let details = state.queries.booking_details(id).await?;

    // Only the parties to the booking, or an admin
    let party = actor.is(details.booking.host_id) || actor.is(details.booking.seeker_id);
    if !party && actor.role != Role::Admin {
        return Err(BookingError::Forbidden.into());
    }

    Ok(Json(details))
}

async fn cancel_booking(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel_booking(&actor, id).await?))
}

async fn confirm_pickup(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    body: Result<Json<OtpBody>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let body = extract_json(body)?;
    Ok(Json(state.bookings.confirm_pickup(&actor, id, &body.otp).await?))
}

async fn initiate_return(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ReturnInitiated>, AppError> {
    Ok(Json(state.bookings.initiate_return(&actor, id).await?))
}

async fn confirm_return(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    body: Result<Json<OtpBody>, JsonRejection>,
) -> Result<Json<ReturnReceipt>, AppError> {
    let body = extract_json(body)?;
    Ok(Json(state.bookings.confirm_return(&actor, id, &body.otp).await?))
}
