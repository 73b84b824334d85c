//! REST API handlers for registration, scratch draws, offer management,
//! and operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use promo_core::types::{CustomerRegistration, Offer, OfferDraft, OfferStatus};
use promo_engine::{DrawError, ScratchEngine};
use promo_store::{CouponStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Maximum string field length (name, phone, code, title, etc.).
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CouponStore>,
    pub engine: Arc<ScratchEngine>,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Store failures at the API boundary. Connectivity is the only category
/// surfaced as retryable-by-user-action; nothing is retried implicitly.
pub(crate) fn store_error(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        StoreError::Unavailable(msg) => {
            warn!(error = %msg, "Store unavailable");
            metrics::counter!("promo.store_errors").increment(1);
            error_response(
                StatusCode::BAD_GATEWAY,
                "store_unavailable",
                "Backing store unavailable, please try again",
            )
        }
        StoreError::NotFound(what) => {
            error_response(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        other => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            other.to_string(),
        ),
    }
}

fn validate_registration(registration: &CustomerRegistration) -> Result<(), &'static str> {
    if registration.name.trim().is_empty() {
        return Err("customer 'name' must not be empty");
    }
    if registration.name.len() > MAX_FIELD_LEN {
        return Err("customer 'name' exceeds maximum length");
    }
    if registration.phone.trim().is_empty() {
        return Err("customer 'phone' must not be empty");
    }
    if registration.phone.len() > 32 {
        return Err("customer 'phone' exceeds maximum length");
    }
    if !registration
        .phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
    {
        return Err("customer 'phone' contains invalid characters");
    }
    Ok(())
}

fn validate_offer_draft(draft: &OfferDraft) -> Result<(), &'static str> {
    if draft.title.trim().is_empty() {
        return Err("offer 'title' must not be empty");
    }
    if draft.title.len() > MAX_FIELD_LEN {
        return Err("offer 'title' exceeds maximum length");
    }
    if draft.starts_at >= draft.ends_at {
        return Err("offer 'starts_at' must precede 'ends_at'");
    }
    Ok(())
}

fn validation_failure(msg: &'static str) -> (StatusCode, Json<ErrorResponse>) {
    metrics::counter!("promo.api.validation_errors").increment(1);
    error_response(StatusCode::BAD_REQUEST, "invalid_request", msg)
}

// ─── Customers ──────────────────────────────────────────────────────────────

/// POST /v1/customers/register — create by phone, or count a visit for a
/// returning customer.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(registration): Json<CustomerRegistration>,
) -> Result<Json<promo_core::types::Customer>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = validate_registration(&registration) {
        warn!(error = msg, "Registration validation failed");
        return Err(validation_failure(msg));
    }

    let customer = state
        .store
        .upsert_customer(registration, Utc::now())
        .map_err(store_error)?;
    info!(customer_id = %customer.id, visits = customer.visit_count, "Customer registered");
    metrics::counter!("promo.registrations").increment(1);
    Ok(Json(customer))
}

#[derive(Deserialize)]
pub struct CustomerQuery {
    pub phone: Option<String>,
}

/// GET /v1/customers — admin list, or a single lookup with `?phone=`.
pub async fn handle_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    match query.phone {
        Some(phone) => {
            let customer = state
                .store
                .find_customer_by_phone(&phone)
                .map_err(store_error)?
                .ok_or_else(|| {
                    error_response(StatusCode::NOT_FOUND, "not_found", "customer not found")
                })?;
            Ok(Json(customer).into_response())
        }
        None => {
            let customers = state.store.list_customers().map_err(store_error)?;
            Ok(Json(customers).into_response())
        }
    }
}

/// GET /v1/customers/:id/history — coupon history, newest first.
pub async fn handle_history(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<promo_core::types::Coupon>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .store
        .get_customer(customer_id)
        .map_err(store_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "not_found", "customer not found"))?;
    let history = state.store.coupon_history(customer_id).map_err(store_error)?;
    Ok(Json(history))
}

// ─── Draws ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DrawRequest {
    pub customer_id: Uuid,
}

/// What the scratch card reveals. The coupon is persisted before this
/// response leaves the server; the reveal animation only uncovers it.
#[derive(Serialize)]
pub struct DrawResponse {
    pub coupon: promo_core::types::Coupon,
    pub offer_id: Uuid,
    pub offer_title: String,
    pub offer_description: String,
}

/// POST /v1/draws — the issuance path: gate → weighted pick → mint.
pub async fn handle_draw(
    State(state): State<AppState>,
    Json(request): Json<DrawRequest>,
) -> Result<Json<DrawResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.engine.draw(request.customer_id, Utc::now()) {
        Ok(card) => Ok(Json(DrawResponse {
            coupon: card.coupon,
            offer_id: card.offer.id,
            offer_title: card.offer.title,
            offer_description: card.offer.description,
        })),
        Err(e) => {
            metrics::counter!(
                "promo.draws_denied",
                "reason" => denial_label(&e)
            )
            .increment(1);
            Err(draw_error(e))
        }
    }
}

fn denial_label(e: &DrawError) -> &'static str {
    match e {
        DrawError::CustomerNotFound => "customer_not_found",
        DrawError::DailyLimitReached => "daily_limit_reached",
        DrawError::NoEligibleOffers => "no_eligible_offers",
        DrawError::Store(_) => "store_error",
    }
}

fn draw_error(e: DrawError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        DrawError::CustomerNotFound => error_response(
            StatusCode::NOT_FOUND,
            "customer_not_found",
            "Customer is not registered",
        ),
        DrawError::DailyLimitReached => error_response(
            StatusCode::CONFLICT,
            "daily_limit_reached",
            "Already scratched today, next draw available tomorrow",
        ),
        DrawError::NoEligibleOffers => error_response(
            StatusCode::NOT_FOUND,
            "no_eligible_offers",
            "No offers available right now",
        ),
        DrawError::Store(e) => store_error(e),
    }
}

/// POST /v1/draws/:code/reveal — scratch-completion ping. Bumps the offer
/// reveal counter; the coupon itself is unchanged.
pub async fn handle_reveal(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match state.engine.reveal(&code) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(draw_error(e)),
    }
}

// ─── Offers ─────────────────────────────────────────────────────────────────

/// GET /v1/offers — admin list, newest first.
pub async fn handle_list_offers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Offer>>, (StatusCode, Json<ErrorResponse>)> {
    let offers = state.store.list_offers().map_err(store_error)?;
    Ok(Json(offers))
}

/// POST /v1/offers — create an offer (active immediately).
pub async fn handle_create_offer(
    State(state): State<AppState>,
    Json(draft): Json<OfferDraft>,
) -> Result<(StatusCode, Json<Offer>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = validate_offer_draft(&draft) {
        warn!(error = msg, "Offer validation failed");
        return Err(validation_failure(msg));
    }

    let offer = state.store.create_offer(draft, Utc::now()).map_err(store_error)?;
    info!(offer_id = %offer.id, title = %offer.title, weight = offer.weight, "Offer created");
    Ok((StatusCode::CREATED, Json(offer)))
}

#[derive(Deserialize)]
pub struct OfferStatusUpdate {
    pub status: OfferStatus,
}

/// PATCH /v1/offers/:id/status — the only mutation an offer allows once
/// coupons reference it.
pub async fn handle_offer_status(
    State(state): State<AppState>,
    Path(offer_id): Path<Uuid>,
    Json(update): Json<OfferStatusUpdate>,
) -> Result<Json<Offer>, (StatusCode, Json<ErrorResponse>)> {
    let offer = state
        .store
        .set_offer_status(offer_id, update.status)
        .map_err(store_error)?;
    info!(offer_id = %offer.id, status = ?offer.status, "Offer status changed");
    Ok(Json(offer))
}

// ─── Operational ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
