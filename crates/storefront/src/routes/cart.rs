//! Cart route handlers.
//!
//! The cart is stored in the visitor's session. Each mutation re-reads the
//! product from storage so stock and price are current.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::cart::{Cart, CartLine};
use atelier_core::product::Product;
use atelier_core::{Money, ProductId};

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError, Result, add_breadcrumb};
use crate::models::session::{load_cart, save_cart};
use crate::state::AppState;

/// One cart line with its total.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Money,
}

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Money,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    line_total: line.line_total(),
                    line: line.clone(),
                })
                .collect(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
        }
    }
}

/// Add to cart payload.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    pub size: Option<String>,
}

/// Update quantity payload.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: u32,
    pub size: Option<String>,
}

/// Line selector for removal.
#[derive(Debug, Default, Deserialize)]
pub struct LineQuery {
    pub size: Option<String>,
}

fn available_stock(product: &Product) -> u32 {
    u32::try_from(product.stock).unwrap_or(0)
}

/// Display the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add an item to the cart.
///
/// # Errors
///
/// Returns 404 for unknown or hidden products and 409 when out of stock.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<AddToCart>,
) -> Result<(StatusCode, Json<CartView>)> {
    let product = state
        .catalog()
        .live_product(form.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    let mut cart = load_cart(&session).await?;
    let quantity = cart.add(
        CartLine::for_product(&product, form.quantity.unwrap_or(1), form.size),
        available_stock(&product),
    )?;
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product", &product.slug), ("quantity", &quantity.to_string())]),
    );

    Ok((StatusCode::CREATED, Json(CartView::from(&cart))))
}

/// Change a line's quantity. Zero removes the line.
///
/// # Errors
///
/// Returns 404 if the line is not in the cart.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(form): ApiJson<UpdateQuantity>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;

    let quantity = match state.catalog().live_product(product_id).await? {
        Some(product) => form.quantity.min(available_stock(&product)),
        None => 0,
    };
    cart.update_quantity(product_id, form.size.as_deref(), quantity)?;
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Remove a line.
///
/// # Errors
///
/// Returns 404 if the line is not in the cart.
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiQuery(query): ApiQuery<LineQuery>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(product_id, query.size.as_deref())?;
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<StatusCode> {
    save_cart(&session, &Cart::new()).await?;
    Ok(StatusCode::NO_CONTENT)
}
