//! ProjectHub Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.
//!
//! The heart of the crate is the cart/wishlist consistency engine
//! ([`store`], [`cache`], [`sync`]) and the checkout settlement workflow
//! ([`checkout`]). Everything else is a thin collaborator boundary:
//! repositories over `PostgreSQL`, a payment-processor client, a download
//! URL signer, and a JSON route layer.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
