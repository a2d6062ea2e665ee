//! Visitor shopping cart.
//!
//! A cart lives in the visitor's session as JSON. Lines are identified by
//! `(product_id, size)` so the same ring in two sizes is two lines.

use serde::{Deserialize, Serialize};

use crate::product::{Material, Product};
use crate::types::{Money, ProductId};

/// Most units of one line a single order may contain.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Errors from cart operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Quantity must be at least one when adding.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The product/size combination is not in the cart.
    #[error("item is not in the cart")]
    LineNotFound,
    /// The product cannot be sold right now.
    #[error("{0} is out of stock")]
    OutOfStock(String),
}

/// One cart line, holding a price snapshot taken when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: Money,
    pub quantity: u32,
    pub image: Option<String>,
    pub material: Material,
    pub gem_color: Option<String>,
    pub size: Option<String>,
}

impl CartLine {
    /// Build a line for `product`, using the product's own size unless one is
    /// chosen.
    #[must_use]
    pub fn for_product(product: &Product, quantity: u32, size: Option<String>) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            price: product.price,
            quantity,
            image: product.primary_image().map(str::to_owned),
            material: product.material,
            gem_color: product.gem_color.clone(),
            size: size.or_else(|| product.size.clone()),
        }
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }

    fn is(&self, product_id: ProductId, size: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size
    }
}

/// The visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Add a line, merging with an existing line for the same product and
    /// size.
    ///
    /// The resulting quantity is capped at `min(MAX_LINE_QUANTITY, stock)`.
    /// Returns the quantity now in the cart for that line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] for a zero quantity and
    /// [`CartError::OutOfStock`] when `stock` is zero.
    pub fn add(&mut self, line: CartLine, stock: u32) -> Result<u32, CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if stock == 0 {
            return Err(CartError::OutOfStock(line.name));
        }
        let cap = MAX_LINE_QUANTITY.min(stock);

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.is(line.product_id, line.size.as_deref()))
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity).min(cap);
            existing.price = line.price;
            return Ok(existing.quantity);
        }

        let quantity = line.quantity.min(cap);
        self.lines.push(CartLine { quantity, ..line });
        Ok(quantity)
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if no such line exists.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id, size);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.is(product_id, size))
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity.min(MAX_LINE_QUANTITY);
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if no such line exists.
    pub fn remove(&mut self, product_id: ProductId, size: Option<&str>) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| !l.is(product_id, size));
        if self.lines.len() == before {
            Err(CartError::LineNotFound)
        } else {
            Ok(())
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of every line total.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total units across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: i64, cents: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Piece {id}"),
            slug: format!("piece-{id}"),
            price: Money::from_cents(cents),
            quantity,
            image: None,
            material: Material::Silver,
            gem_color: None,
            size: None,
        }
    }

    #[test]
    fn merges_same_product_and_size() {
        let mut cart = Cart::new();
        cart.add(line(1, 2_000, 2), 50).unwrap();
        assert_eq!(cart.add(line(1, 2_000, 3), 50).unwrap(), 5);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn different_sizes_are_separate_lines() {
        let mut cart = Cart::new();
        let mut six = line(1, 2_000, 1);
        six.size = Some("6".into());
        let mut seven = line(1, 2_000, 1);
        seven.size = Some("7".into());
        cart.add(six, 5).unwrap();
        cart.add(seven, 5).unwrap();
        assert_eq!(cart.lines().len(), 2);

        cart.update_quantity(ProductId::new(1), Some("7"), 0).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].size.as_deref(), Some("6"));
    }

    #[test]
    fn clamps_to_cap_and_stock() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 100, 8), 50).unwrap(), 8);
        assert_eq!(cart.add(line(1, 100, 8), 50).unwrap(), MAX_LINE_QUANTITY);
        assert_eq!(cart.add(line(2, 100, 4), 2).unwrap(), 2);
    }

    #[test]
    fn rejects_zero_and_sold_out() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 100, 0), 5), Err(CartError::ZeroQuantity));
        assert!(matches!(cart.add(line(1, 100, 1), 0), Err(CartError::OutOfStock(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn update_and_remove_unknown_lines() {
        let mut cart = Cart::new();
        cart.add(line(1, 100, 1), 5).unwrap();
        assert_eq!(
            cart.update_quantity(ProductId::new(9), None, 2),
            Err(CartError::LineNotFound)
        );
        assert_eq!(cart.remove(ProductId::new(9), None), Err(CartError::LineNotFound));
        cart.update_quantity(ProductId::new(1), None, 4).unwrap();
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn subtotal_sums_lines() {
        let mut cart = Cart::new();
        cart.add(line(1, 2_499, 2), 5).unwrap();
        cart.add(line(2, 1_000, 1), 5).unwrap();
        assert_eq!(cart.subtotal(), Money::from_cents(5_998));
        cart.clear();
        assert_eq!(cart.subtotal(), Money::ZERO);
    }
}
