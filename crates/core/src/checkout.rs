//! The checkout wizard: shipping → payment → review → complete.
//!
//! A [`CheckoutDraft`] is the whole state of one visitor's checkout. It is
//! serialized into the session after every change, so a page reload or a
//! second tab resumes exactly where the visitor left off.
//!
//! The draft never talks to the payment gateway itself. The storefront
//! creates an intent for [`CheckoutDraft::totals`] and records it with
//! [`CheckoutDraft::attach_payment_intent`]; anything that changes the totals
//! afterwards drops that intent so a stale amount is never charged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::Cart;
use crate::pricing::{OrderTotals, PricingPolicy, ShippingMethod};
use crate::text_enum;
use crate::types::{Email, Money};
use crate::validation::{FieldError, ValidationErrors, non_blank};

text_enum! {
    /// Wizard step, in the order a visitor moves through them.
    #[derive(Default)]
    pub enum CheckoutStep {
        #[default]
        Shipping => "shipping",
        Payment => "payment",
        Review => "review",
        Complete => "complete",
    }
}

impl CheckoutStep {
    /// The following step, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Shipping => Some(Self::Payment),
            Self::Payment => Some(Self::Review),
            Self::Review => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// The preceding step, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Shipping | Self::Complete => None,
            Self::Payment => Some(Self::Shipping),
            Self::Review => Some(Self::Payment),
        }
    }
}

/// Errors from wizard operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    /// Checkout cannot start (or finish) without items.
    #[error("your cart is empty")]
    EmptyCart,
    /// The current step has invalid or missing fields.
    #[error("please correct the highlighted fields")]
    Invalid(Vec<FieldError>),
    /// The requested step change is not allowed.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: CheckoutStep,
        to: CheckoutStep,
    },
    /// The order was already placed.
    #[error("this checkout is already complete")]
    AlreadyComplete,
    /// The cart changed after the totals were confirmed.
    #[error("your cart changed; please review your order again")]
    CartChanged,
}

/// Where and to whom the order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingDetails {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl Default for ShippingDetails {
    fn default() -> Self {
        Self {
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            address1: String::new(),
            address2: None,
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: "US".to_owned(),
            phone: None,
        }
    }
}

impl ShippingDetails {
    /// `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Whether the address is in the United States.
    #[must_use]
    pub fn is_domestic(&self) -> bool {
        matches!(
            self.country.trim().to_ascii_uppercase().as_str(),
            "US" | "USA" | "UNITED STATES"
        )
    }

    /// Every problem with the shipping step.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = ValidationErrors::new();

        if self.email.trim().is_empty() {
            errors.push("email", "is required");
        } else if let Err(e) = Email::parse(&self.email) {
            errors.push("email", e.to_string());
        }
        errors.require("first_name", &self.first_name);
        errors.require("last_name", &self.last_name);
        errors.require("address1", &self.address1);
        errors.require("city", &self.city);
        errors.require("state", &self.state);
        errors.require("country", &self.country);

        let postal = self.postal_code.trim();
        if postal.is_empty() {
            errors.push("postal_code", "is required");
        } else if self.is_domestic() && !is_us_postal_code(postal) {
            errors.push("postal_code", "must be a 5-digit ZIP code or ZIP+4");
        }

        errors.into_vec()
    }
}

/// `12345` or `12345-6789`.
#[must_use]
pub fn is_us_postal_code(code: &str) -> bool {
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match code.split_once('-') {
        None => code.len() == 5 && all_digits(code),
        Some((zip, plus4)) => {
            zip.len() == 5 && plus4.len() == 4 && all_digits(zip) && all_digits(plus4)
        }
    }
}

/// A partial update from the client. Absent fields are left untouched.
///
/// For the optional `address2` and `phone`, an empty string clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckoutPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub shipping_method: Option<ShippingMethod>,
}

/// One visitor's checkout in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub id: Uuid,
    pub step: CheckoutStep,
    pub shipping: ShippingDetails,
    pub shipping_method: ShippingMethod,
    pub payment_intent_id: Option<String>,
    /// Amount the recorded intent was created for.
    pub payment_amount: Option<Money>,
    pub cart_snapshot: Cart,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutDraft {
    /// Begin a checkout for `cart`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the cart has no lines.
    pub fn start(cart: &Cart) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            step: CheckoutStep::Shipping,
            shipping: ShippingDetails::default(),
            shipping_method: ShippingMethod::default(),
            payment_intent_id: None,
            payment_amount: None,
            cart_snapshot: cart.clone(),
            updated_at: Utc::now(),
        })
    }

    /// Current totals for the snapshot and chosen shipping method.
    #[must_use]
    pub fn totals(&self, policy: &PricingPolicy) -> OrderTotals {
        OrderTotals::compute(&self.cart_snapshot, self.shipping_method, policy)
    }

    /// Merge client field changes without validating them.
    ///
    /// The step is left alone. If the totals change, the recorded payment
    /// intent is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AlreadyComplete`] once the order is placed.
    pub fn apply_patch(
        &mut self,
        patch: CheckoutPatch,
        policy: &PricingPolicy,
    ) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        let before = self.totals(policy);

        let shipping = &mut self.shipping;
        set(&mut shipping.email, patch.email);
        set(&mut shipping.first_name, patch.first_name);
        set(&mut shipping.last_name, patch.last_name);
        set(&mut shipping.address1, patch.address1);
        set(&mut shipping.city, patch.city);
        set(&mut shipping.state, patch.state);
        set(&mut shipping.postal_code, patch.postal_code);
        set(&mut shipping.country, patch.country);
        if patch.address2.is_some() {
            shipping.address2 = non_blank(patch.address2);
        }
        if patch.phone.is_some() {
            shipping.phone = non_blank(patch.phone);
        }
        if let Some(method) = patch.shipping_method {
            self.shipping_method = method;
        }

        if self.totals(policy) != before {
            self.clear_payment();
        }
        self.touch();
        Ok(())
    }

    /// Replace the cart snapshot with the visitor's current cart.
    ///
    /// When the cart differs, any payment intent is dropped and a draft on
    /// the review step goes back to payment. Returns whether anything
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AlreadyComplete`] once the order is placed and
    /// [`CheckoutError::EmptyCart`] if the cart is now empty.
    pub fn sync_cart(&mut self, cart: &Cart) -> Result<bool, CheckoutError> {
        self.ensure_open()?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if *cart == self.cart_snapshot {
            return Ok(false);
        }
        self.cart_snapshot = cart.clone();
        self.clear_payment();
        if self.step == CheckoutStep::Review {
            self.step = CheckoutStep::Payment;
        }
        self.touch();
        Ok(true)
    }

    /// Errors that block leaving `step`.
    #[must_use]
    pub fn validate_step(&self, step: CheckoutStep) -> Vec<FieldError> {
        match step {
            CheckoutStep::Shipping => self.shipping.validate(),
            CheckoutStep::Payment => self.validate_payment(),
            CheckoutStep::Review | CheckoutStep::Complete => {
                let mut errors = ValidationErrors::new();
                if self.cart_snapshot.is_empty() {
                    errors.push("cart", "is empty");
                }
                errors.extend(self.shipping.validate());
                errors.extend(self.validate_payment());
                errors.into_vec()
            }
        }
    }

    fn validate_payment(&self) -> Vec<FieldError> {
        if self.payment_intent_id.is_none() {
            vec![FieldError::new(
                "payment_intent_id",
                "payment details have not been provided",
            )]
        } else {
            Vec::new()
        }
    }

    /// Validate the current step and move to the next one.
    ///
    /// Review is left through [`CheckoutDraft::complete`], not here.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] with the step's field errors,
    /// [`CheckoutError::InvalidTransition`] from review, or
    /// [`CheckoutError::AlreadyComplete`].
    pub fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        let next = match self.step.next() {
            Some(CheckoutStep::Complete) | None => {
                return Err(CheckoutError::InvalidTransition {
                    from: self.step,
                    to: CheckoutStep::Complete,
                });
            }
            Some(next) => next,
        };
        let errors = self.validate_step(self.step);
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }
        self.step = next;
        self.touch();
        Ok(next)
    }

    /// Move one step back. Shipping stays on shipping.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AlreadyComplete`] once the order is placed.
    pub fn back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        if let Some(previous) = self.step.previous() {
            self.step = previous;
            self.touch();
        }
        Ok(self.step)
    }

    /// Jump to `target`.
    ///
    /// Going backwards is always allowed. Going forwards requires every step
    /// before `target` to validate. `Complete` is only reachable through
    /// [`CheckoutDraft::complete`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] with the first failing step's
    /// errors, [`CheckoutError::InvalidTransition`] for `Complete`, or
    /// [`CheckoutError::AlreadyComplete`].
    pub fn go_to(&mut self, target: CheckoutStep) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        if target == CheckoutStep::Complete {
            return Err(CheckoutError::InvalidTransition {
                from: self.step,
                to: target,
            });
        }
        if target > self.step {
            for step in CheckoutStep::ALL.iter().take_while(|s| **s < target) {
                let errors = self.validate_step(*step);
                if !errors.is_empty() {
                    return Err(CheckoutError::Invalid(errors));
                }
            }
        }
        self.step = target;
        self.touch();
        Ok(target)
    }

    /// Record the payment intent created for `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AlreadyComplete`] once the order is placed.
    pub fn attach_payment_intent(
        &mut self,
        id: impl Into<String>,
        amount: Money,
    ) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        self.payment_intent_id = Some(id.into());
        self.payment_amount = Some(amount);
        self.touch();
        Ok(())
    }

    /// The recorded intent id, if it was created for `amount`.
    #[must_use]
    pub fn reusable_intent(&self, amount: Money) -> Option<&str> {
        match (&self.payment_intent_id, self.payment_amount) {
            (Some(id), Some(recorded)) if recorded == amount => Some(id),
            _ => None,
        }
    }

    /// Fail with [`CheckoutError::CartChanged`] unless `cart` matches the
    /// snapshot the totals were computed from.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn ensure_cart_matches(&self, cart: &Cart) -> Result<(), CheckoutError> {
        if *cart == self.cart_snapshot {
            Ok(())
        } else {
            Err(CheckoutError::CartChanged)
        }
    }

    /// Finish the checkout from the review step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] unless on review,
    /// [`CheckoutError::Invalid`] if anything no longer validates, or
    /// [`CheckoutError::AlreadyComplete`].
    pub fn complete(&mut self) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        if self.step != CheckoutStep::Review {
            return Err(CheckoutError::InvalidTransition {
                from: self.step,
                to: CheckoutStep::Complete,
            });
        }
        let errors = self.validate_step(CheckoutStep::Review);
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }
        self.step = CheckoutStep::Complete;
        self.touch();
        Ok(())
    }

    /// Whether the order was placed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.step == CheckoutStep::Complete
    }

    fn ensure_open(&self) -> Result<(), CheckoutError> {
        if self.is_complete() {
            Err(CheckoutError::AlreadyComplete)
        } else {
            Ok(())
        }
    }

    fn clear_payment(&mut self) {
        self.payment_intent_id = None;
        self.payment_amount = None;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn set(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value.trim().to_owned();
    }
}
