//! Booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking::{Booking, BookingCoordinator, BookingStore, CreateBooking};
use common::BookingId;
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookingStore> {
    pub coordinator: Arc<BookingCoordinator<S>>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: String,
    pub resource_id: String,
    pub total_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub user_id: Option<String>,
}

// -- Handlers --

/// POST /bookings: create a PENDING booking.
#[tracing::instrument(skip(state, body))]
pub async fn create<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let booking = state
        .coordinator
        .create(CreateBooking::new(req.user_id, req.resource_id, req.total_amount))
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/{id}: load a booking.
#[tracing::instrument(skip(state))]
pub async fn get<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    // An id that is not a UUID cannot name a booking.
    let booking_id: BookingId = id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Booking not found: {id}")))?;

    let booking = state.coordinator.get(booking_id).await?;
    Ok(Json(booking))
}

/// GET /bookings?user_id=…: list a user's bookings, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ListBookingsQuery>, QueryRejection>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".to_string()))?;

    let bookings = state.coordinator.list_for_user(&user_id).await?;
    Ok(Json(bookings))
}
