//! HTML rendering.
//!
//! Every view is produced as a fragment first. [`Shape::FullPage`] wraps the
//! same fragment in the page shell; [`Shape::Fragment`] sends it bare for
//! the htmx client to swap in. Mutating views also carry a [`ListAction`]
//! telling the client how to patch the contact list it already shows.
//!
//! All interpolated values pass through [`escape`].

use std::fmt::Write as _;

use contact_directory_core::models::{Contact, Gender};
use contact_directory_core::service::ContactList;

use crate::validate::{ContactForm, FieldErrors, SearchParams};

/// Whether a response is a bare fragment or a complete page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Fragment,
    FullPage,
}

/// How the client should update its contact list after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    None,
    Append,
    Replace,
    Remove,
}

impl ListAction {
    /// Name used in the `HX-Trigger` event payload.
    pub fn name(self) -> Option<&'static str> {
        match self {
            ListAction::None => None,
            ListAction::Append => Some("append"),
            ListAction::Replace => Some("replace"),
            ListAction::Remove => Some("remove"),
        }
    }
}

const LIST_BODY_ID: &str = "contact-list-body";
const DETAILS_ID: &str = "contact-details";

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wraps a fragment according to `shape`.
pub fn shaped(shape: Shape, title: &str, fragment: &str) -> String {
    match shape {
        Shape::Fragment => fragment.to_string(),
        Shape::FullPage => page(title, fragment),
    }
}

/// The full page shell.
pub fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} · Contacts</title>
<script src="https://unpkg.com/htmx.org@1.9.12"></script>
</head>
<body>
<header><h1><a href="/contacts/">Contacts</a></h1></header>
<main>
{body}
</main>
<aside id="{details}"></aside>
</body>
</html>
"#,
        title = escape(title),
        body = body,
        details = DETAILS_ID,
    )
}

fn gender_options(selected: &str, include_all: bool) -> String {
    let mut out = String::new();
    if include_all {
        let sel = if selected.is_empty() { " selected" } else { "" };
        let _ = write!(out, r#"<option value=""{}>All</option>"#, sel);
    }
    for gender in Gender::ALL {
        let sel = if selected == gender.code() { " selected" } else { "" };
        let _ = write!(
            out,
            r#"<option value="{}"{}>{}</option>"#,
            gender.code(),
            sel,
            gender.label()
        );
    }
    out
}

fn page_url(params: &SearchParams, page: u32) -> String {
    let mut url = String::from("/contacts/?");
    if let Some(ref search) = params.search_query {
        let _ = write!(url, "search_query={}&", urlencoding::encode(search.trim()));
    }
    if let Some(ref gender) = params.gender_query {
        let _ = write!(url, "gender_query={}&", urlencoding::encode(gender.trim()));
    }
    let _ = write!(url, "page={}", page);
    url
}

/// A single row of the contact table.
pub fn contact_row(contact: &Contact) -> String {
    format!(
        r##"<tr id="contact-{id}">
<td><a href="#" hx-get="/contacts/{id}/" hx-target="#{details}">{name}</a></td>
<td>{email}</td>
<td>{gender}</td>
<td>
<button hx-get="/contacts/{id}/change/" hx-target="#{details}">Edit</button>
<button hx-delete="/contacts/{id}/" hx-target="#{details}" hx-confirm="Delete this contact?">Delete</button>
</td>
</tr>"##,
        id = contact.id,
        details = DETAILS_ID,
        name = escape(&contact.full_name()),
        email = escape(&contact.email_address),
        gender = escape(contact.gender_label()),
    )
}

/// Table rows for one page, plus a "load more" row when a next page exists.
pub fn contact_rows(list: &ContactList, params: &SearchParams) -> String {
    let mut out = String::new();
    if list.contacts.is_empty() {
        out.push_str(r#"<tr class="empty"><td colspan="4">No contacts found.</td></tr>"#);
    }
    for contact in &list.contacts {
        out.push_str(&contact_row(contact));
        out.push('\n');
    }
    if let Some(next) = list.next_page {
        let _ = write!(
            out,
            r#"<tr class="more"><td colspan="4"><button hx-get="{url}" hx-target="closest tr" hx-swap="outerHTML">Load more</button></td></tr>"#,
            url = escape(&page_url(params, next)),
        );
    }
    out
}

fn search_form(params: &SearchParams) -> String {
    format!(
        r##"<form id="contact-search" action="/contacts/" method="get" hx-get="/contacts/" hx-target="#{body}" hx-trigger="input changed delay:300ms from:#search_query, change from:#gender_query, submit">
<input type="search" id="search_query" name="search_query" value="{search}" placeholder="Search through your contacts...">
<label for="gender_query">Filter by gender:</label>
<select id="gender_query" name="gender_query">{options}</select>
</form>"##,
        body = LIST_BODY_ID,
        search = escape(params.search_query.as_deref().unwrap_or("")),
        options = gender_options(params.gender_query.as_deref().unwrap_or("").trim(), true),
    )
}

/// The body of the full contact list page.
pub fn contacts_index(rows: &str, params: &SearchParams) -> String {
    format!(
        r##"{search}
<button hx-get="/contacts/add/" hx-target="#{details}">Add contact</button>
<table id="contact-list">
<thead><tr><th>Name</th><th>Email address</th><th>Gender</th><th></th></tr></thead>
<tbody id="{body}">
{rows}
</tbody>
</table>"##,
        search = search_form(params),
        details = DETAILS_ID,
        body = LIST_BODY_ID,
        rows = rows,
    )
}

fn list_patch(contact: &Contact, action: ListAction) -> String {
    match action {
        ListAction::None => String::new(),
        ListAction::Append => format!(
            r#"<tbody hx-swap-oob="beforeend:#{}">{}</tbody>"#,
            LIST_BODY_ID,
            contact_row(contact)
        ),
        ListAction::Replace => contact_row(contact).replacen(
            "<tr ",
            r#"<tr hx-swap-oob="outerHTML" "#,
            1,
        ),
        ListAction::Remove => format!(
            r#"<tr id="contact-{}" hx-swap-oob="delete"></tr>"#,
            contact.id
        ),
    }
}

/// Read-only view of one contact.
pub fn contact_details(contact: &Contact, action: ListAction) -> String {
    format!(
        r##"<section class="contact-details" data-contact-id="{id}">
<h2>{name}</h2>
<dl>
<dt>First name</dt><dd>{first}</dd>
<dt>Last name</dt><dd>{last}</dd>
<dt>Email address</dt><dd><a href="mailto:{email}">{email}</a></dd>
<dt>Gender</dt><dd>{gender}</dd>
</dl>
<button hx-get="/contacts/{id}/change/" hx-target="#{details}">Edit</button>
</section>
{patch}"##,
        id = contact.id,
        name = escape(&contact.full_name()),
        first = escape(&contact.first_name),
        last = escape(&contact.last_name),
        email = escape(&contact.email_address),
        gender = escape(contact.gender_label()),
        details = DETAILS_ID,
        patch = list_patch(contact, action),
    )
}

/// Confirmation shown after a delete, built from the last-known values.
pub fn contact_deleted(contact: &Contact) -> String {
    format!(
        r#"<section class="contact-deleted">
<p>{name} ({email}) has been deleted.</p>
</section>
{patch}"#,
        name = escape(&contact.full_name()),
        email = escape(&contact.email_address),
        patch = list_patch(contact, ListAction::Remove),
    )
}

/// Messages for a single field.
pub fn form_errors(messages: &[String]) -> String {
    let mut out = String::from(r#"<ul class="field-errors">"#);
    for message in messages {
        let _ = write!(out, "<li>{}</li>", escape(message));
    }
    out.push_str("</ul>");
    out
}

fn text_input(
    name: &str,
    label: &str,
    kind: &str,
    value: &Option<String>,
    errors: &FieldErrors,
    extra: &str,
) -> String {
    format!(
        r#"<p>
<label for="{name}">{label}</label>
<input type="{kind}" id="{name}" name="{name}" value="{value}" required{extra}>
<span class="errors">{errors}</span>
</p>"#,
        name = name,
        label = label,
        kind = kind,
        value = escape(value.as_deref().unwrap_or("")),
        extra = extra,
        errors = if errors.get(name).is_empty() {
            String::new()
        } else {
            form_errors(errors.get(name))
        },
    )
}

/// Create form (`contact` is `None`) or edit form for an existing contact.
pub fn contact_form(form: &ContactForm, errors: &FieldErrors, contact: Option<&Contact>) -> String {
    let (verb, heading) = match contact {
        Some(c) => (
            format!(r#"hx-put="/contacts/{}/""#, c.id),
            format!("Edit {}", escape(&c.full_name())),
        ),
        None => (
            r#"hx-post="/contacts/""#.to_string(),
            "Add contact".to_string(),
        ),
    };
    let gender_errors = errors.get("gender");

    format!(
        r##"<form class="contact-form" {verb} hx-target="#{details}" novalidate>
<h2>{heading}</h2>
{first}
{last}
{email}
<p>
<label for="gender">Gender</label>
<select id="gender" name="gender" required><option value="">Select...</option>{options}</select>
<span class="errors">{gender_errors}</span>
</p>
<div class="submit-buttons"><button type="submit">Save</button></div>
</form>"##,
        verb = verb,
        details = DETAILS_ID,
        heading = heading,
        first = text_input("first_name", "First name", "text", &form.first_name, errors, ""),
        last = text_input("last_name", "Last name", "text", &form.last_name, errors, ""),
        email = text_input(
            "email_address",
            "Email address",
            "email",
            &form.email_address,
            errors,
            r#" hx-post="/validate/email-address/" hx-trigger="change" hx-target="next .errors""#,
        ),
        options = gender_options(form.gender.as_deref().unwrap_or("").trim(), false),
        gender_errors = if gender_errors.is_empty() {
            String::new()
        } else {
            form_errors(gender_errors)
        },
    )
}

/// Error view shared by every failure path.
pub fn exception(status: u16, reason: &str, messages: &[String]) -> String {
    let mut out = format!(
        "<section class=\"exception\">\n<h2>{} {}</h2>\n",
        status,
        escape(reason)
    );
    for message in messages {
        let _ = writeln!(out, "<p>{}</p>", escape(message));
    }
    out.push_str("</section>");
    out
}
