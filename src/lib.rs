//! # Contact Directory
//!
//! **A contact-directory manager served over HTTP.**
//!
//! Contacts can be listed, searched, filtered by gender, paginated, created,
//! edited, and deleted. The same routes answer both full page navigations
//! and htmx fragment requests; the `HX-Request` header decides the response
//! shape and guards the single-contact routes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────────┐   ┌──────────┐
//! │  HTTP server │──▶│ ContactService │──▶│ Query/Paginate  │──▶│  SQLite  │
//! │ (negotiate)  │   │  (core crate)  │   │  ContactStore   │   │ contacts │
//! └──────┬───────┘   └────────────────┘   └─────────────────┘   └──────────┘
//!        ▼
//!   render (fragment | full page)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! contacts init                       # create database
//! contacts serve                      # start HTTP server
//! contacts list --search lee --gender F
//! contacts get 12
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite pool creation |
//! | [`migrate`] | Schema provisioning |
//! | [`sqlite_store`] | Request-scoped SQLite `ContactStore` |
//! | [`validate`] | Form and query-string validation |
//! | [`render`] | HTML fragments and the page shell |
//! | [`delay`] | Injectable simulated latency |
//! | [`error`] | Request failure taxonomy |
//! | [`server`] | Routing, negotiation, handlers |
//! | [`list`] / [`get`] | CLI read commands |

pub mod config;
pub mod db;
pub mod delay;
pub mod error;
pub mod get;
pub mod list;
pub mod migrate;
pub mod render;
pub mod server;
pub mod sqlite_store;
pub mod validate;
