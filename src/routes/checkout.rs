// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay checkout: order creation and payment verification.
//!
//! Both endpoints run behind the session middleware. The gateway
//! credentials are checked before the request body, so a misconfigured
//! deployment fails closed regardless of input.
//!
//! Orders are priced from `plan_price_rupees` and carry the buyer, plan and
//! puzzle in their notes. Verification re-reads the order from the gateway
//! and grants from those notes; the client's copy is only cross-checked.

use crate::db::firestore::{MembershipPurchase, PaymentEffects};
use crate::error::{AppError, Result};
use crate::models::transaction::{plan_price_rupees, PLAN_SINGLE_PUZZLE, STATUS_SUCCESS};
use crate::models::{PlanGrant, PuzzleId, SessionUser, Transaction};
use crate::routes::StatusResponse;
use crate::services::razorpay::{receipt_id, verify_payment_signature, Order, OrderRequest};
use crate::services::RazorpayError;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

const CURRENCY: &str = "INR";
const PAISE_PER_RUPEE: u64 = 100;

/// Checkout routes (require a session; middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/razorpay", post(create_order))
        .route("/api/razorpay/verify", post(verify_payment))
}

// ─── Order Creation ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Whole rupees
    #[validate(required, range(min = 1, max = 10_000_000))]
    pub amount: Option<u64>,
    #[validate(required, length(min = 1, max = 64))]
    pub plan_id: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub puzzle_id: Option<String>,
}

/// Create a Razorpay order and hand the gateway's order object back.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let (key_id, key_secret) = state.config.razorpay_credentials().ok_or_else(|| {
        AppError::Configuration("RAZORPAY_KEY_ID or RAZORPAY_KEY_SECRET is not set".to_string())
    })?;

    let Json(body) = payload?;
    body.validate()?;

    let amount = body.amount.unwrap_or_default();
    let plan_id = body.plan_id.as_deref().map(str::trim).unwrap_or_default();
    if amount == 0 || plan_id.is_empty() {
        return Err(AppError::BadRequest(
            "Amount and planId are required".to_string(),
        ));
    }
    let price = plan_price_rupees(plan_id)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown plan {plan_id}")))?;
    if amount != price {
        return Err(AppError::BadRequest(format!(
            "Amount for {plan_id} must be {price}"
        )));
    }
    let puzzle_id = parse_optional_puzzle(body.puzzle_id.as_deref())?;

    let mut notes = BTreeMap::new();
    notes.insert("userId".to_string(), user.uid.clone());
    notes.insert("planId".to_string(), plan_id.to_string());
    if let Some(email) = &user.email {
        notes.insert("email".to_string(), email.clone());
    }
    if let Some(puzzle_id) = &puzzle_id {
        notes.insert("puzzleId".to_string(), puzzle_id.to_string());
    }

    let order = OrderRequest {
        amount: amount * PAISE_PER_RUPEE,
        currency: CURRENCY.to_string(),
        receipt: receipt_id(&user.uid, Utc::now().timestamp_millis()),
        notes,
    };

    let created = state
        .razorpay
        .create_order(key_id, key_secret, &order)
        .await
        .map_err(|e| gateway_error(e, "Failed to create order"))?;

    tracing::info!(
        uid = %user.uid,
        plan_id,
        amount = order.amount,
        receipt = %order.receipt,
        order_id = created.get("id").and_then(|v| v.as_str()).unwrap_or(""),
        "Razorpay order created"
    );

    Ok(Json(created))
}

fn gateway_error(err: RazorpayError, summary: &'static str) -> AppError {
    match err {
        RazorpayError::Gateway {
            status,
            code,
            description,
        } => AppError::PaymentGateway {
            summary,
            message: format!("HTTP {status} {code}: {description}"),
            description: Some(description).filter(|d| !d.is_empty()),
        },
        RazorpayError::Transport(message) => AppError::PaymentGateway {
            summary,
            message,
            description: None,
        },
    }
}

fn parse_optional_puzzle(raw: Option<&str>) -> Result<Option<PuzzleId>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PuzzleId>()
                .map_err(|e| AppError::BadRequest(e.to_string()))
        })
        .transpose()
}

// ─── Payment Verification ────────────────────────────────────

/// Fields from the checkout widget's success handler, plus what was bought.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 64))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, max = 64))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, max = 128))]
    pub razorpay_signature: String,
    #[serde(rename = "planId")]
    #[validate(length(min = 1, max = 64))]
    pub plan_id: String,
    #[serde(rename = "puzzleId", default)]
    #[validate(length(min = 1, max = 512))]
    pub puzzle_id: Option<String>,
}

/// What a verified order paid for, taken from the gateway's copy.
#[derive(Debug, PartialEq)]
struct PaidOrder {
    plan_id: String,
    puzzle_id: Option<PuzzleId>,
    /// Paise
    amount: u64,
}

/// Check a gateway order against the session and the client's claims.
fn paid_order(
    order: &Order,
    uid: &str,
    claimed_plan: &str,
    claimed_puzzle: Option<&PuzzleId>,
) -> Result<PaidOrder> {
    if order.note("userId") != Some(uid) {
        return Err(AppError::Forbidden(
            "Order was not created for this user".to_string(),
        ));
    }

    let plan_id = order
        .note("planId")
        .ok_or_else(|| AppError::BadRequest("Order has no planId".to_string()))?;
    if plan_id != claimed_plan {
        return Err(AppError::BadRequest(
            "planId does not match the order".to_string(),
        ));
    }

    let puzzle_id = parse_optional_puzzle(order.note("puzzleId"))?;
    if claimed_puzzle.is_some() && claimed_puzzle != puzzle_id.as_ref() {
        return Err(AppError::BadRequest(
            "puzzleId does not match the order".to_string(),
        ));
    }

    let price = plan_price_rupees(plan_id)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown plan {plan_id}")))?;
    if order.currency != CURRENCY || order.amount != price * PAISE_PER_RUPEE {
        return Err(AppError::BadRequest(
            "Order amount does not match the plan price".to_string(),
        ));
    }

    Ok(PaidOrder {
        plan_id: plan_id.to_string(),
        puzzle_id,
        amount: order.amount,
    })
}

/// Verify the checkout signature and grant what the order paid for.
async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    payload: std::result::Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let (key_id, key_secret) = state.config.razorpay_credentials().ok_or_else(|| {
        AppError::Configuration("RAZORPAY_KEY_ID or RAZORPAY_KEY_SECRET is not set".to_string())
    })?;

    let Json(body) = payload?;
    body.validate()?;

    if !verify_payment_signature(
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
        key_secret,
    ) {
        tracing::warn!(
            uid = %user.uid,
            order_id = %body.razorpay_order_id,
            payment_id = %body.razorpay_payment_id,
            "Payment signature mismatch"
        );
        return Err(AppError::BadRequest("Invalid payment signature".to_string()));
    }

    let claimed_puzzle = parse_optional_puzzle(body.puzzle_id.as_deref())?;
    let order = state
        .razorpay
        .fetch_order(key_id, key_secret, &body.razorpay_order_id)
        .await
        .map_err(|e| gateway_error(e, "Failed to verify payment"))?;

    let paid = paid_order(&order, &user.uid, body.plan_id.trim(), claimed_puzzle.as_ref())
        .inspect_err(|e| {
            tracing::warn!(
                uid = %user.uid,
                order_id = %order.id,
                error = %e,
                "Order does not match payment"
            )
        })?;

    let plan_id = paid.plan_id.as_str();
    let now = Utc::now();
    let grant = PlanGrant::for_plan(plan_id);

    let mut effects = PaymentEffects::default();
    let mut credit_used = false;
    match grant {
        PlanGrant::Credit => {
            // A puzzle chosen at checkout is unlocked now; otherwise the credit is banked
            if let Some(puzzle) = paid.puzzle_id.clone() {
                effects.unlock = Some(puzzle);
                credit_used = true;
            }
        }
        PlanGrant::Membership { .. } => {
            effects.membership = grant.membership_duration().map(|duration| MembershipPurchase {
                plan_id: plan_id.to_string(),
                duration,
            });
        }
        PlanGrant::Unknown => {
            tracing::warn!(uid = %user.uid, plan_id, "Payment for unknown plan recorded without a grant");
        }
    }

    let transaction = Transaction {
        id: None,
        user_id: user.uid.clone(),
        plan_id: plan_id.to_string(),
        status: STATUS_SUCCESS.to_string(),
        credit_used,
        order_id: Some(order.id.clone()),
        payment_id: Some(body.razorpay_payment_id.clone()),
        puzzle_id: paid
            .puzzle_id
            .as_ref()
            .filter(|_| plan_id == PLAN_SINGLE_PUZZLE)
            .map(|p| p.to_string()),
        amount: Some(paid.amount),
        created_at: Some(format_utc_rfc3339(now)),
    };

    let recorded = state
        .db
        .record_payment(&body.razorpay_payment_id, &transaction, effects)
        .await?;

    tracing::info!(
        uid = %user.uid,
        plan_id,
        amount = paid.amount,
        payment_id = %body.razorpay_payment_id,
        recorded,
        "Payment verified"
    );

    Ok(Json(StatusResponse::success()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_surfaces_description() {
        let err = gateway_error(
            RazorpayError::Gateway {
                status: 400,
                code: "BAD_REQUEST_ERROR".to_string(),
                description: "The amount must be atleast INR 1.00".to_string(),
            },
            "Failed to create order",
        );
        match err {
            AppError::PaymentGateway {
                summary,
                description,
                ..
            } => {
                assert_eq!(summary, "Failed to create order");
                assert_eq!(description.as_deref(), Some("The amount must be atleast INR 1.00"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn optional_puzzle_parsing() {
        assert!(parse_optional_puzzle(None).unwrap().is_none());
        assert!(parse_optional_puzzle(Some("  ")).unwrap().is_none());
        assert_eq!(
            parse_optional_puzzle(Some("animals/_pro_cat.jpg"))
                .unwrap()
                .map(|p| p.to_string()),
            Some("animals/_pro_cat.jpg".to_string())
        );
        assert!(parse_optional_puzzle(Some("../etc/passwd")).is_err());
    }

    fn order(notes: serde_json::Value, amount: u64) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": "order_1",
            "amount": amount,
            "currency": "INR",
            "status": "paid",
            "notes": notes,
        }))
        .unwrap()
    }

    #[test]
    fn paid_order_comes_from_gateway_notes() {
        let o = order(
            serde_json::json!({"userId": "u1", "planId": "single_puzzle", "puzzleId": "animals/_pro_cat.jpg"}),
            4900,
        );
        let paid = paid_order(&o, "u1", "single_puzzle", None).unwrap();
        assert_eq!(paid.plan_id, "single_puzzle");
        assert_eq!(
            paid.puzzle_id.map(|p| p.to_string()).as_deref(),
            Some("animals/_pro_cat.jpg")
        );
        assert_eq!(paid.amount, 4900);
    }

    #[test]
    fn paid_order_rejects_other_users_order() {
        let o = order(serde_json::json!({"userId": "u2", "planId": "pro_monthly"}), 19900);
        assert!(matches!(
            paid_order(&o, "u1", "pro_monthly", None),
            Err(AppError::Forbidden(_))
        ));

        let anonymous = order(serde_json::json!([]), 19900);
        assert!(matches!(
            paid_order(&anonymous, "u1", "pro_monthly", None),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn paid_order_rejects_upgraded_claims() {
        let o = order(serde_json::json!({"userId": "u1", "planId": "single_puzzle"}), 4900);
        assert!(matches!(
            paid_order(&o, "u1", "pro_yearly", None),
            Err(AppError::BadRequest(_))
        ));

        let other: PuzzleId = "nature/_pro_aurora.jpg".parse().unwrap();
        let with_puzzle = order(
            serde_json::json!({"userId": "u1", "planId": "single_puzzle", "puzzleId": "animals/_pro_cat.jpg"}),
            4900,
        );
        assert!(matches!(
            paid_order(&with_puzzle, "u1", "single_puzzle", Some(&other)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn paid_order_rejects_underpriced_order() {
        let o = order(serde_json::json!({"userId": "u1", "planId": "pro_yearly"}), 100);
        assert!(matches!(
            paid_order(&o, "u1", "pro_yearly", None),
            Err(AppError::BadRequest(_))
        ));

        let unknown = order(serde_json::json!({"userId": "u1", "planId": "lifetime_gold"}), 100);
        assert!(matches!(
            paid_order(&unknown, "u1", "lifetime_gold", None),
            Err(AppError::BadRequest(_))
        ));
    }
}
