//! # Contact Directory Core
//!
//! Storage-agnostic logic for Contact Directory: data models, the
//! query/pagination engine, the store abstraction, and the contact service.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Persistence backends implement [`store::ContactStore`]; the native crate
//! provides the SQLite one.

pub mod models;
pub mod query;
pub mod service;
pub mod store;
