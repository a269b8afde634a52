//! Storage abstraction for Contact Directory.
//!
//! The [`ContactStore`] trait defines every persistence operation the
//! contact service needs, enabling pluggable backends (SQLite, in-memory).
//! A store knows nothing about HTTP or presentation.
//!
//! Stores are handed out per unit of work by a [`StoreProvider`]. A backend
//! that holds a connection acquires it lazily inside the store and releases
//! it when the store is dropped, so no connection outlives the request that
//! used it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{Contact, ContactFields};
use crate::query::ContactQuery;

/// One page of a listing plus whether a further page exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListWindow {
    pub contacts: Vec<Contact>,
    pub has_next_page: bool,
}

/// Abstract storage backend for contacts.
///
/// Not-found is an expected outcome and is reported through the return
/// value, never as an error. Errors are reserved for backend faults.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](ContactStore::get) | Point lookup by id |
/// | [`list`](ContactStore::list) | Filtered, ordered, windowed listing |
/// | [`create`](ContactStore::create) | Insert and assign a fresh id |
/// | [`update`](ContactStore::update) | Replace all four mutable fields |
/// | [`delete`](ContactStore::delete) | Remove permanently |
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Retrieve a contact by id.
    async fn get(&self, id: i64) -> Result<Option<Contact>>;

    /// Fetch the page window for `query`, then count the full filtered set
    /// to decide whether a next page exists.
    ///
    /// The two reads are not a single snapshot; a concurrent write between
    /// them can shift the next-page answer by one page boundary.
    async fn list(&self, query: &ContactQuery) -> Result<ListWindow>;

    /// Insert a contact and return it with its assigned id.
    ///
    /// Ids are never reused, even after the highest id is deleted.
    async fn create(&self, fields: &ContactFields) -> Result<Contact>;

    /// Replace the mutable fields of an existing contact.
    ///
    /// Returns `None` if no contact has this id.
    async fn update(&self, id: i64, fields: &ContactFields) -> Result<Option<Contact>>;

    /// Delete a contact. Returns `false` if no contact had this id.
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
impl<T: ContactStore + ?Sized> ContactStore for Arc<T> {
    async fn get(&self, id: i64) -> Result<Option<Contact>> {
        (**self).get(id).await
    }

    async fn list(&self, query: &ContactQuery) -> Result<ListWindow> {
        (**self).list(query).await
    }

    async fn create(&self, fields: &ContactFields) -> Result<Contact> {
        (**self).create(fields).await
    }

    async fn update(&self, id: i64, fields: &ContactFields) -> Result<Option<Contact>> {
        (**self).update(id, fields).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        (**self).delete(id).await
    }
}

/// Hands out a store for one unit of work (typically one HTTP request).
///
/// The returned store owns whatever per-request resources it needs and
/// releases them on drop, on every exit path.
pub trait StoreProvider: Send + Sync {
    fn open(&self) -> Box<dyn ContactStore>;
}

impl StoreProvider for Arc<memory::InMemoryStore> {
    fn open(&self) -> Box<dyn ContactStore> {
        Box::new(Arc::clone(self))
    }
}
