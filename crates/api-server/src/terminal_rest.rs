//! Staff terminal REST endpoints: the validate → redeem two-step.

use crate::rest::{error_response, store_error, ErrorResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use promo_engine::{
    RedeemReceipt, RedeemRejection, RedeemRequest, RedemptionTerminal, TerminalRedeemOutcome,
    ValidationResult,
};
use std::sync::Arc;
use tracing::warn;

const MAX_CODE_LEN: usize = 64;

/// Shared state for terminal endpoints.
#[derive(Clone)]
pub struct TerminalState {
    pub terminal: Arc<RedemptionTerminal>,
}

fn validate_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("coupon 'code' must not be empty");
    }
    if code.len() > MAX_CODE_LEN {
        return Err("coupon 'code' exceeds maximum length");
    }
    Ok(())
}

/// GET /v1/terminal/validate/:code — read-only lookup + evaluation.
///
/// Always 200 with the display projection; the `is_valid` flag and the
/// per-cause message tell the operator what they are looking at. Safe to
/// call any number of times.
pub async fn handle_validate(
    State(state): State<TerminalState>,
    Path(code): Path<String>,
) -> Result<Json<ValidationResult>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = validate_code(&code) {
        warn!(error = msg, "Terminal validate rejected at boundary");
        return Err(error_response(StatusCode::BAD_REQUEST, "invalid_request", msg));
    }

    let result = state
        .terminal
        .validate(code.trim(), Utc::now())
        .map_err(store_error)?;
    Ok(Json(result))
}

/// POST /v1/terminal/redeem — the mutating step, only after operator
/// confirmation. Re-validates server-side; the client's earlier Validate
/// response carries no authority.
pub async fn handle_redeem(
    State(state): State<TerminalState>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<RedeemReceipt>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(msg) = validate_code(&request.code) {
        warn!(error = msg, "Terminal redeem rejected at boundary");
        return Err(error_response(StatusCode::BAD_REQUEST, "invalid_request", msg));
    }

    match state
        .terminal
        .redeem(&request, Utc::now())
        .map_err(store_error)?
    {
        TerminalRedeemOutcome::Redeemed(receipt) => Ok(Json(receipt)),
        TerminalRedeemOutcome::Rejected(rejection) => {
            metrics::counter!(
                "promo.redemptions_rejected",
                "reason" => rejection_label(rejection)
            )
            .increment(1);
            Err(rejection_response(rejection))
        }
    }
}

fn rejection_label(rejection: RedeemRejection) -> &'static str {
    match rejection {
        RedeemRejection::NotFound => "not_found",
        RedeemRejection::AlreadyRedeemed => "already_redeemed",
        RedeemRejection::Expired => "expired",
        RedeemRejection::IdentityMismatch => "identity_mismatch",
    }
}

/// Each rejection gets its own status and message so the terminal never
/// shows a generic failure for a known cause.
fn rejection_response(rejection: RedeemRejection) -> (StatusCode, Json<ErrorResponse>) {
    let status = match rejection {
        RedeemRejection::NotFound => StatusCode::NOT_FOUND,
        RedeemRejection::AlreadyRedeemed => StatusCode::CONFLICT,
        RedeemRejection::Expired => StatusCode::GONE,
        RedeemRejection::IdentityMismatch => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, rejection_label(rejection), rejection.message())
}
