//! Stride Core - cart, checkout, order and review model.
//!
//! This crate holds everything the storefront knows about a shopper's cart
//! and the checkout flow that does not depend on HTTP:
//!
//! - [`types`] - Newtype wrappers for ids, prices, statuses and credentials
//! - [`cart`] - Line item keys, selection, per-item loading state and the
//!   coordinator that drives cart mutations
//! - [`checkout`] - Shipping form, payment methods, the step wizard and
//!   order submission
//! - [`orders`] - Order history paging, reorder and mark-received rules
//! - [`reviews`] - Review drafts and submission
//! - [`catalog`] - Products as the backend describes them
//! - [`notice`] - One-shot toast messages
//! - [`remote`] - The error every collaborator call fails with
//!
//! # Architecture
//!
//! The core crate performs no I/O. Every remote operation goes through a
//! collaborator trait (`CartStore`, `OrderGateway`, `ReviewGateway`, ...)
//! that the storefront implements on top of its backend HTTP client.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod notice;
pub mod orders;
pub mod remote;
pub mod reviews;
pub mod types;

pub use remote::RemoteError;
pub use types::*;
