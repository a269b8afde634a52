//! Core data models for Contact Directory.
//!
//! A [`Contact`] is the only persisted entity. [`ContactFields`] carries the
//! four mutable fields of a contact after validation, and is the only input
//! accepted by store writers.

use serde::Serialize;
use std::fmt;

/// The fixed gender enumeration a contact may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// Every accepted value, in display order.
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    /// The code persisted in storage and used in query strings.
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    /// Parses an exact stored code (`"M"` or `"F"`).
    pub fn from_code(code: &str) -> Option<Gender> {
        Gender::ALL.into_iter().find(|g| g.code() == code)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A persisted contact record.
///
/// `gender` holds the raw stored code. Rows written by this crate always
/// carry a valid [`Gender`] code, but pre-existing data may not; such values
/// display as `Unknown` rather than failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub gender: String,
}

impl Contact {
    /// Builds a contact from validated fields and a store-assigned id.
    pub fn from_fields(id: i64, fields: &ContactFields) -> Self {
        Self {
            id,
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            email_address: fields.email_address.clone(),
            gender: fields.gender.code().to_string(),
        }
    }

    /// The stored gender, if it is a member of the enumeration.
    pub fn gender(&self) -> Option<Gender> {
        Gender::from_code(&self.gender)
    }

    pub fn gender_label(&self) -> &'static str {
        self.gender().map(Gender::label).unwrap_or("Unknown")
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The mutable fields of this contact, if its gender is valid.
    pub fn fields(&self) -> Option<ContactFields> {
        Some(ContactFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_address: self.email_address.clone(),
            gender: self.gender()?,
        })
    }
}

/// The four mutable fields of a contact, already trimmed and validated.
///
/// Create and update always replace all four fields as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub gender: Gender,
}
