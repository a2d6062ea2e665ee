//! Shipping tiers, sales tax and order totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::text_enum;
use crate::types::Money;

text_enum! {
    /// Shipping speed chosen at checkout.
    #[derive(Default)]
    pub enum ShippingMethod {
        #[default]
        Standard => "standard",
        Express => "express",
        Overnight => "overnight",
    }
}

impl ShippingMethod {
    /// Flat price of the tier before any free-shipping discount.
    #[must_use]
    pub fn base_cost(self) -> Money {
        match self {
            Self::Standard => Money::from_cents(599),
            Self::Express => Money::from_cents(1_499),
            Self::Overnight => Money::from_cents(2_999),
        }
    }

    /// Display name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard Shipping",
            Self::Express => "Express Shipping",
            Self::Overnight => "Overnight Shipping",
        }
    }

    /// Business-day delivery estimate.
    #[must_use]
    pub const fn estimated_days(self) -> &'static str {
        match self {
            Self::Standard => "5-7 business days",
            Self::Express => "2-3 business days",
            Self::Overnight => "1 business day",
        }
    }
}

/// Store-wide pricing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Sales tax rate applied to the merchandise subtotal (e.g. `0.08`).
    pub tax_rate: Decimal,
    /// Subtotal at or above which standard shipping is free.
    pub free_shipping_threshold: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Money::from_cents(15_000),
        }
    }
}

impl PricingPolicy {
    /// Shipping cost for `method` on an order with `subtotal`.
    ///
    /// Nothing to ship costs nothing.
    #[must_use]
    pub fn shipping_cost(&self, method: ShippingMethod, subtotal: Money) -> Money {
        if subtotal.is_zero() {
            return Money::ZERO;
        }
        match method {
            ShippingMethod::Standard if subtotal >= self.free_shipping_threshold => Money::ZERO,
            _ => method.base_cost(),
        }
    }

    /// Every shipping method priced for `subtotal`.
    #[must_use]
    pub fn shipping_quotes(&self, subtotal: Money) -> Vec<ShippingQuote> {
        ShippingMethod::ALL
            .iter()
            .map(|&method| ShippingQuote {
                method,
                label: method.label(),
                estimated_days: method.estimated_days(),
                cost: self.shipping_cost(method, subtotal),
            })
            .collect()
    }
}

/// A priced shipping option, as shown on the shipping step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingQuote {
    pub method: ShippingMethod,
    pub label: &'static str,
    pub estimated_days: &'static str,
    pub cost: Money,
}

/// The money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `subtotal + shipping + tax`, where tax is charged on the subtotal only.
    #[must_use]
    pub fn compute(cart: &Cart, method: ShippingMethod, policy: &PricingPolicy) -> Self {
        let subtotal = cart.subtotal();
        let shipping = policy.shipping_cost(method, subtotal);
        let tax = subtotal.apply_rate(policy.tax_rate);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::tests::line;

    fn cart_of(cents: i64) -> Cart {
        let mut cart = Cart::new();
        cart.add(line(1, cents, 1), 5).unwrap();
        cart
    }

    #[test]
    fn standard_shipping_under_threshold() {
        let totals = OrderTotals::compute(
            &cart_of(10_000),
            ShippingMethod::Standard,
            &PricingPolicy::default(),
        );
        assert_eq!(totals.subtotal, Money::from_cents(10_000));
        assert_eq!(totals.shipping, Money::from_cents(599));
        assert_eq!(totals.tax, Money::from_cents(800));
        assert_eq!(totals.total, Money::from_cents(11_399));
    }

    #[test]
    fn free_standard_shipping_at_threshold() {
        let policy = PricingPolicy::default();
        assert_eq!(
            policy.shipping_cost(ShippingMethod::Standard, Money::from_cents(14_999)),
            Money::from_cents(599)
        );
        assert_eq!(
            policy.shipping_cost(ShippingMethod::Standard, Money::from_cents(15_000)),
            Money::ZERO
        );
        assert_eq!(
            policy.shipping_cost(ShippingMethod::Express, Money::from_cents(15_000)),
            Money::from_cents(1_499)
        );
    }

    #[test]
    fn tax_rounds_to_cents_and_skips_shipping() {
        // 8% of $10.31 = $0.8248
        let totals = OrderTotals::compute(
            &cart_of(1_031),
            ShippingMethod::Overnight,
            &PricingPolicy::default(),
        );
        assert_eq!(totals.tax, Money::from_cents(82));
        assert_eq!(totals.total, Money::from_cents(1_031 + 2_999 + 82));

        // 7.5% of $10.10 = $0.7575
        let policy = PricingPolicy {
            tax_rate: Decimal::new(75, 3),
            ..PricingPolicy::default()
        };
        let totals = OrderTotals::compute(&cart_of(1_010), ShippingMethod::Standard, &policy);
        assert_eq!(totals.tax, Money::from_cents(76));
    }

    #[test]
    fn empty_cart_costs_nothing() {
        let totals = OrderTotals::compute(
            &Cart::new(),
            ShippingMethod::Overnight,
            &PricingPolicy::default(),
        );
        assert_eq!(totals.total, Money::ZERO);
    }

    #[test]
    fn quotes_every_method() {
        let quotes = PricingPolicy::default().shipping_quotes(Money::from_cents(20_000));
        let costs: Vec<Money> = quotes.iter().map(|q| q.cost).collect();
        assert_eq!(
            costs,
            [Money::ZERO, Money::from_cents(1_499), Money::from_cents(2_999)]
        );
    }
}
