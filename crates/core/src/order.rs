//! Orders placed through the checkout wizard.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::checkout::{CheckoutDraft, CheckoutError, CheckoutStep, ShippingDetails};
use crate::pricing::{OrderTotals, PricingPolicy, ShippingMethod};
use crate::types::{Email, Money, OrderId, OrderStatus};
use crate::validation::FieldError;

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ATL";

const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub email: Email,
    pub shipping: ShippingDetails,
    pub shipping_method: ShippingMethod,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax: Money,
    pub total: Money,
    pub payment_intent_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// An order ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: String,
    pub email: Email,
    pub shipping: ShippingDetails,
    pub shipping_method: ShippingMethod,
    pub lines: Vec<CartLine>,
    pub totals: OrderTotals,
    pub payment_intent_id: String,
    pub status: OrderStatus,
}

impl NewOrder {
    /// Build an order from a draft that has reached the review step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] when the draft is not on
    /// review and [`CheckoutError::Invalid`] when it has no valid email or
    /// payment intent.
    pub fn from_draft(
        draft: &CheckoutDraft,
        policy: &PricingPolicy,
        status: OrderStatus,
    ) -> Result<Self, CheckoutError> {
        if draft.step != CheckoutStep::Review {
            return Err(CheckoutError::InvalidTransition {
                from: draft.step,
                to: CheckoutStep::Complete,
            });
        }
        let errors = draft.validate_step(CheckoutStep::Review);
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }
        let email = Email::parse(&draft.shipping.email)
            .map_err(|e| CheckoutError::Invalid(vec![FieldError::new("email", e.to_string())]))?;
        let payment_intent_id = draft.payment_intent_id.clone().ok_or_else(|| {
            CheckoutError::Invalid(vec![FieldError::new(
                "payment_intent_id",
                "payment details have not been provided",
            )])
        })?;

        Ok(Self {
            order_number: generate_order_number(Utc::now().date_naive()),
            email,
            shipping: draft.shipping.clone(),
            shipping_method: draft.shipping_method,
            lines: draft.cart_snapshot.lines().to_vec(),
            totals: draft.totals(policy),
            payment_intent_id,
            status,
        })
    }
}

/// `ATL-YYYYMMDD-XXXXXX`, with six random characters from an alphabet
/// without look-alikes (no `0`, `O`, `1`, `I`).
#[must_use]
pub fn generate_order_number(date: NaiveDate) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_ALPHABET.len());
            ORDER_NUMBER_ALPHABET.get(idx).map_or('X', |b| char::from(*b))
        })
        .collect();
    format!(
        "{ORDER_NUMBER_PREFIX}-{}-{suffix}",
        date.format("%Y%m%d")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checkout::tests::{cart, draft_at_review};

    #[test]
    fn order_number_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let number = generate_order_number(date);
        assert!(number.starts_with("ATL-20250309-"), "{number}");
        assert_eq!(number.len(), "ATL-20250309-".len() + 6);
        assert!(
            number
                .rsplit('-')
                .next()
                .unwrap()
                .bytes()
                .all(|b| ORDER_NUMBER_ALPHABET.contains(&b))
        );
    }

    #[test]
    fn builds_from_review_draft() {
        let policy = PricingPolicy::default();
        let draft = draft_at_review();
        let order = NewOrder::from_draft(&draft, &policy, OrderStatus::Paid).unwrap();
        assert_eq!(order.email.as_str(), "maya@example.com");
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.payment_intent_id, "pi_123");
        assert_eq!(order.totals, draft.totals(&policy));
    }

    #[test]
    fn rejects_draft_before_review() {
        let draft = CheckoutDraft::start(&cart()).unwrap();
        assert!(matches!(
            NewOrder::from_draft(&draft, &PricingPolicy::default(), OrderStatus::Paid),
            Err(CheckoutError::InvalidTransition { .. })
        ));
    }
}
