//! Query/pagination engine.
//!
//! Translates a `(search text, gender filter, page)` tuple into a list of
//! [`Predicate`]s combined with AND, a deterministic ordering, and a
//! [`Window`] over the ordered, filtered set.
//!
//! The engine is storage-agnostic. Each predicate carries its own value so a
//! backend can bind it as a parameter (the SQLite store pushes one bind per
//! predicate) or evaluate it directly ([`Predicate::matches`], used by the
//! in-memory store). Filter values are never spliced into query text.
//!
//! # Pagination
//!
//! Pages are 1-based with a fixed [`PAGE_SIZE`]. Whether a further page
//! exists is decided from a separate count over the *unwindowed* filtered
//! set ([`has_next_page`]), not from the size of the fetched window.

use std::cmp::Ordering;

use crate::models::{Contact, Gender};

/// Number of contacts per page.
pub const PAGE_SIZE: u32 = 20;

/// A single filter condition. Absent inputs produce no predicate at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match against first name, last name, or
    /// email address (any of the three).
    Search(String),
    /// Case-insensitive equality against the stored gender code.
    Gender(Gender),
}

impl Predicate {
    /// Evaluates this predicate against a contact in memory.
    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Predicate::Search(text) => {
                let needle = text.to_lowercase();
                [
                    &contact.first_name,
                    &contact.last_name,
                    &contact.email_address,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            Predicate::Gender(gender) => contact.gender.to_uppercase() == gender.code(),
        }
    }
}

/// Offset/limit slice of the ordered result set for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u32,
}

impl Window {
    /// The window for a 1-based page number.
    pub fn for_page(page: u32) -> Self {
        debug_assert!(page >= 1, "page numbers start at 1");
        Self {
            offset: u64::from(page.saturating_sub(1)) * u64::from(PAGE_SIZE),
            limit: PAGE_SIZE,
        }
    }
}

/// Whether rows exist beyond `page`, given the total filtered row count.
pub fn has_next_page(total: u64, page: u32) -> bool {
    total > u64::from(page) * u64::from(PAGE_SIZE)
}

/// Listing order: first name, then last name, then id to keep ties stable
/// across page boundaries.
pub fn listing_order(a: &Contact, b: &Contact) -> Ordering {
    a.first_name
        .cmp(&b.first_name)
        .then_with(|| a.last_name.cmp(&b.last_name))
        .then_with(|| a.id.cmp(&b.id))
}

/// A listing request: optional filters plus a page number (>= 1).
///
/// `page` is assumed to be validated upstream; the engine never clamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub page: u32,
}

impl Default for ContactQuery {
    fn default() -> Self {
        Self {
            search: None,
            gender: None,
            page: 1,
        }
    }
}

impl ContactQuery {
    pub fn new(search: Option<String>, gender: Option<Gender>, page: u32) -> Self {
        Self {
            search,
            gender,
            page,
        }
    }

    /// The predicates to AND together. Empty means every contact matches.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(ref text) = self.search {
            predicates.push(Predicate::Search(text.clone()));
        }
        if let Some(gender) = self.gender {
            predicates.push(Predicate::Gender(gender));
        }
        predicates
    }

    pub fn window(&self) -> Window {
        Window::for_page(self.page)
    }

    /// Evaluates the full AND-combined filter against a contact.
    pub fn matches(&self, contact: &Contact) -> bool {
        self.predicates().iter().all(|p| p.matches(contact))
    }

    /// The page number to offer next, if `total` rows extend past this page.
    pub fn next_page(&self, total: u64) -> Option<u32> {
        has_next_page(total, self.page).then(|| self.page + 1)
    }
}
