//! Services behind the storefront routes.
//!
//! - `catalog` - Cached read access to the active catalog
//! - `payments` - Payment gateway client

pub mod catalog;
pub mod payments;

pub use catalog::CatalogService;
pub use payments::{
    CreateIntentRequest, HttpPaymentGateway, PaymentError, PaymentGateway, PaymentIntent,
    PaymentIntentStatus,
};
