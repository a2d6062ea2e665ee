//! Atelier Core - domain library for the jewelry storefront.
//!
//! This crate is shared by every Atelier component:
//! - `storefront` - Public catalog, cart and checkout API
//! - `admin` - Internal back-office API (product editor, featured placement)
//! - `cli` - Migrations, seeding and token generation
//!
//! # Architecture
//!
//! The core crate holds the domain model and the pure logic around it: no
//! database access, no HTTP clients, no sessions. Everything here can be
//! exercised from a plain unit test.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, money, email and status enums
//! - [`product`] - Catalog product records and the editor payload
//! - [`catalog`] - Storefront browse filters, sorting and paging
//! - [`cart`] - Visitor cart lines
//! - [`pricing`] - Shipping tiers, tax and order totals
//! - [`checkout`] - The shipping → payment → review wizard
//! - [`order`] - Orders created from completed checkouts
//! - [`design_request`] - Custom design enquiries
//! - [`validation`] - Field-level validation errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod design_request;
pub mod order;
pub mod pricing;
pub mod product;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::FieldError;
