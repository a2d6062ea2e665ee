//! Checkout wizard route handlers.
//!
//! The draft lives in the visitor's session and is re-synced with the cart on
//! every wizard call, except order processing, which must see exactly the
//! cart the payment was taken for.
//!
//! ```text
//! GET /api/checkout ─► PATCH (fields) ─► POST next ─► POST payment-intent
//!                                          │              │ (client confirms)
//!                                          ▼              ▼
//!                                       POST next ─► POST process-order
//! ```

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use atelier_core::checkout::{CheckoutDraft, CheckoutError, CheckoutPatch, CheckoutStep};
use atelier_core::order::{NewOrder, Order};
use atelier_core::pricing::{OrderTotals, ShippingQuote};
use atelier_core::{FieldError, Money, OrderStatus};
use atelier_db::RepositoryError;

use crate::error::{ApiJson, ApiPath, AppError, Result, add_breadcrumb};
use crate::models::session::{
    clear_draft, load_cart, load_draft, load_placed_intent, save_cart, save_draft,
    save_placed_intent,
};
use crate::services::{CreateIntentRequest, PaymentError, PaymentIntent, payments};
use crate::state::AppState;

/// Draft plus everything the wizard needs to render the current step.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub draft: CheckoutDraft,
    pub totals: OrderTotals,
    pub shipping_methods: Vec<ShippingQuote>,
    /// Errors blocking the current step; empty when `next` would succeed.
    pub step_errors: Vec<FieldError>,
}

impl CheckoutView {
    fn new(state: &AppState, draft: CheckoutDraft) -> Self {
        let policy = state.pricing();
        Self {
            totals: draft.totals(policy),
            shipping_methods: policy.shipping_quotes(draft.cart_snapshot.subtotal()),
            step_errors: draft.validate_step(draft.step),
            draft,
        }
    }
}

/// Payment intent handed to the client SDK.
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Money,
    pub publishable_key: String,
}

/// Placed order summary.
#[derive(Debug, Serialize)]
pub struct OrderConfirmation {
    pub order_number: String,
    pub email: String,
    pub total: Money,
    pub status: OrderStatus,
}

impl From<&Order> for OrderConfirmation {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number.clone(),
            email: order.email.to_string(),
            total: order.total,
            status: order.status,
        }
    }
}

/// The visitor's open draft, synced with the current cart, or a new draft
/// for it.
async fn current_draft(session: &Session) -> Result<CheckoutDraft> {
    let cart = load_cart(session).await?;

    match load_draft(session).await? {
        Some(mut draft) if !draft.is_complete() => match draft.sync_cart(&cart) {
            Ok(changed) => {
                if changed {
                    info!(draft_id = %draft.id, "Cart changed, checkout draft re-synced");
                }
                Ok(draft)
            }
            Err(e) => {
                clear_draft(session).await?;
                Err(e.into())
            }
        },
        _ => Ok(CheckoutDraft::start(&cart)?),
    }
}

/// Run `op` against the current draft and persist the result.
///
/// The draft is saved even when `op` fails, so the re-sync is kept.
async fn with_draft<F>(state: &AppState, session: &Session, op: F) -> Result<Json<CheckoutView>>
where
    F: FnOnce(&mut CheckoutDraft) -> std::result::Result<(), CheckoutError>,
{
    let mut draft = current_draft(session).await?;
    let outcome = op(&mut draft);
    save_draft(session, &draft).await?;
    outcome?;
    Ok(Json(CheckoutView::new(state, draft)))
}

/// Current draft and totals. Starts a draft from the cart if none exists.
///
/// # Errors
///
/// Returns 409 if the cart is empty.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    with_draft(&state, &session, |_| Ok(())).await
}

/// Merge field changes into the draft.
///
/// # Errors
///
/// Returns 409 if the cart is empty.
#[instrument(skip(state, session, patch))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiJson(patch): ApiJson<CheckoutPatch>,
) -> Result<Json<CheckoutView>> {
    let policy = *state.pricing();
    with_draft(&state, &session, |draft| draft.apply_patch(patch, &policy)).await
}

/// Validate the current step and move forward.
///
/// # Errors
///
/// Returns 422 with the step's field errors.
#[instrument(skip(state, session))]
pub async fn next(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    with_draft(&state, &session, |draft| draft.advance().map(|_| ())).await
}

/// Move one step back.
///
/// # Errors
///
/// Returns 409 if the cart is empty.
#[instrument(skip(state, session))]
pub async fn back(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    with_draft(&state, &session, |draft| draft.back().map(|_| ())).await
}

/// Jump to a step.
///
/// # Errors
///
/// Returns 400 for unknown steps and 422 when a skipped step is invalid.
#[instrument(skip(state, session))]
pub async fn go_to(
    State(state): State<AppState>,
    session: Session,
    ApiPath(step): ApiPath<String>,
) -> Result<Json<CheckoutView>> {
    let target: CheckoutStep = step
        .parse()
        .map_err(|e: atelier_core::ParseEnumError| AppError::BadRequest(e.to_string()))?;
    with_draft(&state, &session, |draft| draft.go_to(target).map(|_| ())).await
}

/// Abandon the draft. The cart is kept.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
#[instrument(skip(session))]
pub async fn abandon(session: Session) -> Result<StatusCode> {
    clear_draft(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Shipping options priced for the current cart.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
#[instrument(skip(state, session))]
pub async fn shipping_methods(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<ShippingQuote>>> {
    let cart = load_cart(&session).await?;
    Ok(Json(state.pricing().shipping_quotes(cart.subtotal())))
}

/// Create (or reuse) a payment intent for the draft's total.
///
/// # Errors
///
/// Returns 409 unless on the payment step, 422 if shipping is incomplete and
/// 502 if the gateway fails.
#[instrument(skip(state, session))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PaymentIntentResponse>> {
    let mut draft = current_draft(&session).await?;
    save_draft(&session, &draft).await?;
    if draft.step != CheckoutStep::Payment {
        return Err(CheckoutError::InvalidTransition {
            from: draft.step,
            to: CheckoutStep::Payment,
        }
        .into());
    }
    let errors = draft.validate_step(CheckoutStep::Shipping);
    if !errors.is_empty() {
        return Err(CheckoutError::Invalid(errors).into());
    }

    let total = draft.totals(state.pricing()).total;
    let amount_cents = total
        .to_cents()
        .ok_or_else(|| AppError::Internal(format!("order total out of range: {total}")))?;

    let intent = match reusable_intent(&state, &draft, total, amount_cents).await? {
        Some(intent) => intent,
        None => {
            let request = CreateIntentRequest {
                amount_cents,
                idempotency_key: payments::idempotency_key(draft.id, amount_cents),
                receipt_email: Some(draft.shipping.email.clone()),
                metadata: vec![
                    ("checkout_id".to_owned(), draft.id.to_string()),
                    ("customer_name".to_owned(), draft.shipping.full_name()),
                    (
                        "item_count".to_owned(),
                        draft.cart_snapshot.item_count().to_string(),
                    ),
                ],
            };
            let intent = state.payments().create_intent(request).await?;
            info!(payment_intent = %intent.id, amount_cents, "Payment intent created");
            intent
        }
    };

    let client_secret = intent
        .client_secret
        .clone()
        .ok_or_else(|| AppError::Internal("payment intent has no client secret".to_owned()))?;

    draft.attach_payment_intent(&intent.id, total)?;
    save_draft(&session, &draft).await?;

    Ok(Json(PaymentIntentResponse {
        payment_intent_id: intent.id,
        client_secret,
        amount: total,
        publishable_key: state.config().payment.publishable_key.clone(),
    }))
}

/// The recorded intent, if it was made for this total and can still be
/// confirmed.
async fn reusable_intent(
    state: &AppState,
    draft: &CheckoutDraft,
    total: Money,
    amount_cents: i64,
) -> Result<Option<PaymentIntent>> {
    let Some(id) = draft.reusable_intent(total) else {
        return Ok(None);
    };

    match state.payments().retrieve_intent(id).await {
        Ok(intent) if intent.status.is_open() && intent.amount == amount_cents => {
            info!(payment_intent = %intent.id, "Reusing payment intent");
            Ok(Some(intent))
        }
        Ok(intent) => {
            info!(payment_intent = %intent.id, status = ?intent.status, "Recorded payment intent is no longer usable");
            Ok(None)
        }
        Err(PaymentError::NotFound(_)) => {
            warn!(payment_intent = %id, "Recorded payment intent no longer exists");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Verify payment and place the order.
///
/// Resubmitting after a success (or after a failure to clear the session)
/// returns the order already recorded for the payment intent.
///
/// # Errors
///
/// Returns 409 unless on review or when the cart changed, 402 when the
/// intent is not paid for the order total, and 502 if the gateway fails.
#[instrument(skip(state, session))]
pub async fn process_order(
    State(state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<OrderConfirmation>)> {
    let cart = load_cart(&session).await?;
    let Some(mut draft) = load_draft(&session).await? else {
        return placed_order(&state, &session).await;
    };

    if draft.step != CheckoutStep::Review {
        return Err(CheckoutError::InvalidTransition {
            from: draft.step,
            to: CheckoutStep::Complete,
        }
        .into());
    }
    draft.ensure_cart_matches(&cart)?;

    let policy = state.pricing();
    let new_order = NewOrder::from_draft(&draft, policy, OrderStatus::Paid)?;

    if let Some(order) = state
        .repos()
        .orders
        .get_by_payment_intent(&new_order.payment_intent_id)
        .await?
    {
        info!(order_number = %order.order_number, "Order already placed for payment intent");
        finish(&state, &session, &mut draft).await?;
        return Ok((StatusCode::OK, Json(OrderConfirmation::from(&order))));
    }

    verify_payment(&state, &new_order).await?;

    let order = match state.repos().orders.create(&new_order).await {
        Ok(order) => order,
        Err(RepositoryError::Conflict(_)) => {
            let order = state
                .repos()
                .orders
                .get_by_payment_intent(&new_order.payment_intent_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("order conflict without a stored order".to_owned())
                })?;
            info!(order_number = %order.order_number, "Order placed by a concurrent submission");
            finish(&state, &session, &mut draft).await?;
            return Ok((StatusCode::OK, Json(OrderConfirmation::from(&order))));
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        order_number = %order.order_number,
        total = %order.total,
        "Order placed"
    );
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", &order.order_number)]),
    );

    finish(&state, &session, &mut draft).await?;
    Ok((StatusCode::CREATED, Json(OrderConfirmation::from(&order))))
}

/// The order this session already placed, for a resubmission that arrives
/// after the draft was closed out.
async fn placed_order(
    state: &AppState,
    session: &Session,
) -> Result<(StatusCode, Json<OrderConfirmation>)> {
    let Some(intent) = load_placed_intent(session).await? else {
        return Err(AppError::NotFound("checkout".to_owned()));
    };
    let order = state
        .repos()
        .orders
        .get_by_payment_intent(&intent)
        .await?
        .ok_or_else(|| AppError::NotFound("checkout".to_owned()))?;

    info!(order_number = %order.order_number, "Order already placed in this session");
    Ok((StatusCode::OK, Json(OrderConfirmation::from(&order))))
}

/// Check the gateway agrees the order total was paid.
async fn verify_payment(state: &AppState, order: &NewOrder) -> Result<()> {
    let expected = order.totals.total.to_cents().ok_or_else(|| {
        AppError::Internal(format!("order total out of range: {}", order.totals.total))
    })?;
    let intent = state
        .payments()
        .retrieve_intent(&order.payment_intent_id)
        .await?;

    if !intent.status.is_paid() {
        warn!(payment_intent = %intent.id, status = ?intent.status, "Order submitted before payment completed");
        return Err(AppError::PaymentIncomplete(
            "payment has not been completed".to_owned(),
        ));
    }
    if intent.amount != expected {
        warn!(
            payment_intent = %intent.id,
            paid = intent.amount,
            expected,
            "Payment amount does not match order total"
        );
        return Err(AppError::PaymentIncomplete(
            "payment amount does not match the order total".to_owned(),
        ));
    }
    Ok(())
}

/// Close out the checkout: empty the cart, drop the draft and let the
/// catalog pick up the new stock levels.
async fn finish(state: &AppState, session: &Session, draft: &mut CheckoutDraft) -> Result<()> {
    if let Err(e) = draft.complete() {
        warn!(error = %e, draft_id = %draft.id, "Draft could not be marked complete");
    }
    let mut cart = load_cart(session).await?;
    cart.clear();
    save_cart(session, &cart).await?;
    if let Some(intent) = &draft.payment_intent_id {
        save_placed_intent(session, intent).await?;
    }
    clear_draft(session).await?;
    state.catalog().invalidate().await;
    Ok(())
}
