//! Form validation.
//!
//! Turns raw submitted values into trimmed, typed inputs for the contact
//! service, or into a [`FieldErrors`] map of field name to messages. The
//! service trusts a successful result and never re-validates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

use contact_directory_core::models::{ContactFields, Gender};
use contact_directory_core::query::ContactQuery;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\w.\-]+@([\w\-]+\.)+[\w\-]{2,}$").expect("email regex must compile")
});

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const INVALID_CHOICE: &str = "Not a valid choice.";
pub const INVALID_INTEGER: &str = "Not a valid integer value.";
pub const PAGE_TOO_SMALL: &str = "Please provide a minimum integer value of 1.";

/// Field name → human-readable error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Every message, in field-name order.
    pub fn messages(&self) -> Vec<String> {
        self.0.values().flatten().cloned().collect()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Raw contact form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl ContactForm {
    /// A form prefilled from stored values.
    pub fn from_contact(contact: &contact_directory_core::models::Contact) -> Self {
        Self {
            first_name: Some(contact.first_name.clone()),
            last_name: Some(contact.last_name.clone()),
            email_address: Some(contact.email_address.clone()),
            gender: Some(contact.gender.clone()),
        }
    }
}

/// Raw single-field email submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailForm {
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Raw listing query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub gender_query: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &Option<String>) -> String {
    match trimmed(value) {
        Some(v) => v,
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
    }
}

fn check_email(errors: &mut FieldErrors, value: &Option<String>) -> String {
    let email = required(errors, "email_address", value);
    if !email.is_empty() && !EMAIL_RE.is_match(&email) {
        errors.add("email_address", INVALID_EMAIL);
    }
    email
}

pub fn validate_email(form: &EmailForm) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    let email = check_email(&mut errors, &form.email_address);
    errors.into_result(|| email)
}

pub fn validate_contact(form: &ContactForm) -> Result<ContactFields, FieldErrors> {
    let mut errors = FieldErrors::new();
    let first_name = required(&mut errors, "first_name", &form.first_name);
    let last_name = required(&mut errors, "last_name", &form.last_name);
    let email_address = check_email(&mut errors, &form.email_address);

    let gender = match trimmed(&form.gender) {
        None => {
            errors.add("gender", REQUIRED);
            None
        }
        Some(code) => {
            let gender = Gender::from_code(&code);
            if gender.is_none() {
                errors.add("gender", INVALID_CHOICE);
            }
            gender
        }
    };

    match gender {
        Some(gender) if errors.is_empty() => Ok(ContactFields {
            first_name,
            last_name,
            email_address,
            gender,
        }),
        _ => Err(errors),
    }
}

pub fn validate_search(params: &SearchParams) -> Result<ContactQuery, FieldErrors> {
    let mut errors = FieldErrors::new();
    let search = trimmed(&params.search_query);

    // Filter codes compare case-insensitively, like the stored-value match.
    let gender = trimmed(&params.gender_query).and_then(|code| {
        let gender = Gender::from_code(&code.to_uppercase());
        if gender.is_none() {
            errors.add("gender_query", INVALID_CHOICE);
        }
        gender
    });

    let page = match trimmed(&params.page) {
        None => 1,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n < 1 => {
                errors.add("page", PAGE_TOO_SMALL);
                1
            }
            Ok(n) if n < i64::from(u32::MAX) => n as u32,
            _ => {
                errors.add("page", INVALID_INTEGER);
                1
            }
        },
    };

    errors.into_result(|| ContactQuery::new(search, gender, page))
}
