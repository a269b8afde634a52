//! In-memory [`ContactStore`] implementation for testing.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock` for thread safety. Listing
//! evaluates the query's predicates directly and sorts with
//! [`listing_order`], so it agrees with the SQLite ordering.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Contact, ContactFields};
use crate::query::{listing_order, ContactQuery};

use super::{ContactStore, ListWindow};

struct Inner {
    contacts: BTreeMap<i64, Contact>,
    last_id: i64,
}

/// In-memory contact store.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                contacts: BTreeMap::new(),
                last_id: 0,
            }),
        }
    }

    /// Inserts a raw record as-is, bypassing validation. Used to simulate
    /// pre-existing data such as unknown gender codes.
    pub fn insert_raw(&self, contact: Contact) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        inner.last_id = inner.last_id.max(contact.id);
        inner.contacts.insert(contact.id, contact);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner.contacts.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Contact>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner.contacts.get(&id).cloned())
    }

    async fn list(&self, query: &ContactQuery) -> Result<ListWindow> {
        let window = query.window();

        let mut matched: Vec<Contact> = {
            let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
            inner
                .contacts
                .values()
                .filter(|c| query.matches(c))
                .cloned()
                .collect()
        };
        matched.sort_by(listing_order);

        let contacts: Vec<Contact> = matched
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();

        let total = {
            let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
            inner.contacts.values().filter(|c| query.matches(c)).count() as u64
        };

        Ok(ListWindow {
            contacts,
            has_next_page: query.next_page(total).is_some(),
        })
    }

    async fn create(&self, fields: &ContactFields) -> Result<Contact> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        inner.last_id += 1;
        let contact = Contact::from_fields(inner.last_id, fields);
        inner.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update(&self, id: i64, fields: &ContactFields) -> Result<Option<Contact>> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner.contacts.get_mut(&id).map(|existing| {
            *existing = Contact::from_fields(id, fields);
            existing.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner.contacts.remove(&id).is_some())
    }
}
