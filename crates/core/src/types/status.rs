//! Status enums for products, orders and design requests.
//!
//! Each is stored as `snake_case` text in `PostgreSQL` and sent with the same
//! spelling over JSON.

use crate::text_enum;

text_enum! {
    /// Publication state of a catalog product.
    ///
    /// Only [`ProductStatus::Active`] products are visible on the storefront.
    #[derive(Default)]
    pub enum ProductStatus {
        /// Being edited; not public yet.
        #[default]
        Draft => "draft",
        /// Listed on the storefront.
        Active => "active",
        /// Retired; kept for order history.
        Archived => "archived",
    }
}

text_enum! {
    /// Order payment state.
    pub enum OrderStatus {
        /// Payment captured by the gateway.
        Paid => "paid",
        /// Intent authorized but not yet captured.
        PaymentPending => "payment_pending",
        /// Cancelled by the shop.
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Workflow state of a custom design enquiry.
    #[derive(Default)]
    pub enum DesignRequestStatus {
        /// Submitted, not yet looked at.
        #[default]
        New => "new",
        /// A designer is working on it.
        InReview => "in_review",
        /// A quote was sent to the customer.
        Quoted => "quoted",
        /// Finished or declined.
        Closed => "closed",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_through_from_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn rejects_unknown_text() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid OrderStatus: shipped");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&DesignRequestStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
        let back: ProductStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(back, ProductStatus::Archived);
    }
}
