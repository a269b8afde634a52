//! Contact service: one operation per use case.
//!
//! Each operation returns an explicit outcome. `Ok(None)` means the id did
//! not resolve to a live contact; `Err` is reserved for backend faults.
//! Input validation happens upstream, so writers assume well-formed fields.

use anyhow::Result;
use serde::Serialize;

use crate::models::{Contact, ContactFields};
use crate::query::ContactQuery;
use crate::store::ContactStore;

/// One page of contacts and the page number to request next, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactList {
    pub contacts: Vec<Contact>,
    pub next_page: Option<u32>,
}

/// Orchestrates [`ContactStore`] calls for a single unit of work.
pub struct ContactService<'a> {
    store: &'a dyn ContactStore,
}

impl<'a> ContactService<'a> {
    pub fn new(store: &'a dyn ContactStore) -> Self {
        Self { store }
    }

    pub async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactList> {
        let window = self.store.list(query).await?;
        Ok(ContactList {
            contacts: window.contacts,
            next_page: window.has_next_page.then(|| query.page + 1),
        })
    }

    pub async fn create_contact(&self, fields: &ContactFields) -> Result<Contact> {
        self.store.create(fields).await
    }

    pub async fn fetch_for_edit(&self, id: i64) -> Result<Option<Contact>> {
        self.store.get(id).await
    }

    pub async fn update_contact(&self, id: i64, fields: &ContactFields) -> Result<Option<Contact>> {
        self.store.update(id, fields).await
    }

    /// Deletes a contact and returns its last-known values.
    ///
    /// If the contact vanishes between the lookup and the delete, the
    /// losing call reports not-found.
    pub async fn delete_contact(&self, id: i64) -> Result<Option<Contact>> {
        let Some(contact) = self.store.get(id).await? else {
            return Ok(None);
        };
        if self.store.delete(id).await? {
            Ok(Some(contact))
        } else {
            Ok(None)
        }
    }
}
