//! HTTP server: routing, content negotiation, and request handling.
//!
//! Every request is classified once by [`negotiate`] from its `HX-Request`
//! header. That [`Transport`] decides two things:
//!
//! - **Access**: routes that fetch or mutate a single contact, serve forms,
//!   or validate fields sit behind [`require_fragment`] and answer 403 to
//!   plain page navigations before any store work happens.
//! - **Shape**: fragment-capable requests get the bare fragment; others get
//!   the same fragment wrapped in the page shell. Errors go through the same
//!   choice in [`negotiate`].
//!
//! # Endpoints
//!
//! | Method | Path | Fragment only | Description |
//! |--------|------|---------------|-------------|
//! | `GET`  | `/` | no | Redirect to `/contacts/` |
//! | `GET`  | `/contacts/` | no | List/search/paginate |
//! | `POST` | `/contacts/` | no | Create |
//! | `GET`  | `/contacts/{id}/` | yes | Show one contact |
//! | `PUT`  | `/contacts/{id}/` | yes | Update |
//! | `DELETE` | `/contacts/{id}/` | yes | Delete |
//! | `GET`  | `/contacts/add/` | yes | Blank form |
//! | `GET`  | `/contacts/{id}/change/` | yes | Prefilled form |
//! | `POST` | `/validate/email-address/` | yes | Validate one email field |
//!
//! # Status codes
//!
//! `200` success, `400` validation failure or malformed request, `403`
//! missing `HX-Request`, `404` unknown id, `405` wrong method, `415` body is
//! not form-encoded, `500` unexpected fault. All but the form re-renders go
//! through the same error view.

use axum::{
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use contact_directory_core::models::Contact;
use contact_directory_core::service::ContactService;
use contact_directory_core::store::StoreProvider;

use crate::config::Config;
use crate::db;
use crate::delay::{self, ResponseDelay};
use crate::error::{AppError, ErrorReport};
use crate::migrate;
use crate::render::{self, ListAction, Shape};
use crate::sqlite_store::SqliteProvider;
use crate::validate::{self, ContactForm, EmailForm, FieldErrors, SearchParams};

/// Header set by the htmx client on every request it issues.
pub const HX_REQUEST: &str = "hx-request";
/// Response header carrying client-side events.
pub const HX_TRIGGER: &str = "hx-trigger";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Opens a request-scoped store; dropping it releases its connection.
    stores: Arc<dyn StoreProvider>,
    /// Simulated latency on list and detail responses.
    delay: Arc<dyn ResponseDelay>,
}

impl AppState {
    pub fn new(stores: Arc<dyn StoreProvider>, delay: Arc<dyn ResponseDelay>) -> Self {
        Self { stores, delay }
    }
}

// ============ Transport negotiation ============

/// How the current request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    /// `true` when the request came from the fragment-capable client.
    pub fragment: bool,
}

impl Transport {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let fragment = headers
            .get(HX_REQUEST)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "true");
        Self { fragment }
    }

    pub fn shape(self) -> Shape {
        if self.fragment {
            Shape::Fragment
        } else {
            Shape::FullPage
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Transport {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Transport>()
            .copied()
            .unwrap_or_else(|| Transport::from_headers(&parts.headers)))
    }
}

/// Marks a response whose body is already the view the client should see,
/// including re-rendered forms answering 400.
#[derive(Debug, Clone, Copy)]
struct Rendered;

/// Classifies the request once, then renders every failure produced
/// downstream in the negotiated shape.
///
/// Failures come either from [`AppError`] (carrying an [`ErrorReport`]) or
/// from axum itself: extractor rejections, 405 from the router. The latter
/// get a report built from their status.
async fn negotiate(mut req: Request, next: Next) -> Response {
    let transport = Transport::from_headers(req.headers());
    req.extensions_mut().insert(transport);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::VARY, HeaderValue::from_static("HX-Request"));

    let report = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => report,
        None if is_unrendered_failure(&response) => ErrorReport::from_status(response.status()),
        None => return response,
    };
    let allow = response.headers().get(header::ALLOW).cloned();

    let reason = report.status.canonical_reason().unwrap_or("Error");
    let fragment = render::exception(report.status.as_u16(), reason, &report.messages);
    let mut rendered = (
        report.status,
        Html(render::shaped(transport.shape(), reason, &fragment)),
    )
        .into_response();
    rendered
        .headers_mut()
        .insert(header::VARY, HeaderValue::from_static("HX-Request"));
    if let Some(allow) = allow {
        rendered.headers_mut().insert(header::ALLOW, allow);
    }
    rendered
}

fn is_unrendered_failure(response: &Response) -> bool {
    let status = response.status();
    (status.is_client_error() || status.is_server_error())
        && response.extensions().get::<Rendered>().is_none()
}

/// Rejects requests that did not come from the fragment client.
async fn require_fragment(
    transport: Transport,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !transport.fragment {
        return Err(AppError::AccessDenied);
    }
    Ok(next.run(req).await)
}

// ============ Views ============

/// A rendered handler result before shape selection.
struct View {
    status: StatusCode,
    title: String,
    fragment: String,
    /// Contact the list action applies to, if any.
    list_change: Option<(ListAction, i64)>,
}

impl View {
    fn contact(contact: &Contact, action: ListAction) -> Self {
        Self {
            status: StatusCode::OK,
            title: contact.full_name(),
            fragment: render::contact_details(contact, action),
            list_change: action.name().map(|_| (action, contact.id)),
        }
    }

    fn deleted(contact: &Contact) -> Self {
        Self {
            status: StatusCode::OK,
            title: "Contact deleted".to_string(),
            fragment: render::contact_deleted(contact),
            list_change: Some((ListAction::Remove, contact.id)),
        }
    }

    fn form(form: &ContactForm, errors: &FieldErrors, contact: Option<&Contact>) -> Self {
        Self {
            status: if errors.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            },
            title: match contact {
                Some(c) => format!("Edit {}", c.full_name()),
                None => "Add contact".to_string(),
            },
            fragment: render::contact_form(form, errors, contact),
            list_change: None,
        }
    }

    fn into_response(self, shape: Shape) -> Response {
        let mut response = (
            self.status,
            Html(render::shaped(shape, &self.title, &self.fragment)),
        )
            .into_response();
        response.extensions_mut().insert(Rendered);

        if let Some((action, id)) = self.list_change {
            if let Some(name) = action.name() {
                let payload = serde_json::json!({
                    "contactListChanged": { "action": name, "id": id }
                });
                if let Ok(value) = HeaderValue::from_str(&payload.to_string()) {
                    response.headers_mut().insert(HX_TRIGGER, value);
                }
            }
        }
        response
    }
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

// ============ Router ============

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let fragment_only = Router::new()
        .route(
            "/contacts/{id}/",
            get(show_contact).put(update_contact).delete(delete_contact),
        )
        .route("/contacts/add/", get(add_form))
        .route("/contacts/{id}/change/", get(change_form))
        .route("/validate/email-address/", post(validate_email))
        .route_layer(middleware::from_fn(require_fragment));

    Router::new()
        .route("/", get(index))
        .route("/contacts/", get(list_contacts).post(create_contact))
        .merge(fragment_only)
        .fallback(unknown_route)
        .layer(middleware::from_fn(negotiate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on an already-bound listener until shutdown.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
    }
}

/// Starts the HTTP server.
///
/// Opens the database pool, makes sure the schema exists, and binds to
/// `[server].bind`. Runs until the process receives Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let state = AppState::new(
        Arc::new(SqliteProvider::new(pool.clone())),
        delay::from_config(&config.delay),
    );

    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        delay = config.delay.enabled,
        "contact directory listening"
    );

    serve(listener, state).await?;
    pool.close().await;
    Ok(())
}

// ============ Handlers ============

async fn index() -> Redirect {
    Redirect::to("/contacts/")
}

async fn unknown_route() -> AppError {
    AppError::NotFound
}

/// `GET /contacts/`
async fn list_contacts(
    State(state): State<AppState>,
    transport: Transport,
    Query(params): Query<SearchParams>,
) -> Result<Response, AppError> {
    let query = validate::validate_search(&params).map_err(AppError::Validation)?;

    let store = state.stores.open();
    let list = ContactService::new(store.as_ref())
        .list_contacts(&query)
        .await?;
    drop(store);

    state.delay.pause().await;

    let rows = render::contact_rows(&list, &params);
    let body = match transport.shape() {
        Shape::Fragment => rows,
        Shape::FullPage => render::page("Contacts", &render::contacts_index(&rows, &params)),
    };
    Ok(Html(body).into_response())
}

/// `POST /contacts/`
async fn create_contact(
    State(state): State<AppState>,
    transport: Transport,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    let view = match validate::validate_contact(&form) {
        Ok(fields) => {
            let store = state.stores.open();
            let contact = ContactService::new(store.as_ref())
                .create_contact(&fields)
                .await?;
            drop(store);
            tracing::info!(id = contact.id, "contact created");
            View::contact(&contact, ListAction::Append)
        }
        Err(errors) => View::form(&form, &errors, None),
    };

    state.delay.pause().await;
    Ok(view.into_response(transport.shape()))
}

/// `GET /contacts/{id}/`
async fn show_contact(
    State(state): State<AppState>,
    transport: Transport,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;

    let store = state.stores.open();
    let contact = ContactService::new(store.as_ref())
        .fetch_for_edit(id)
        .await?
        .ok_or(AppError::NotFound)?;
    drop(store);

    state.delay.pause().await;
    Ok(View::contact(&contact, ListAction::None).into_response(transport.shape()))
}

/// `PUT /contacts/{id}/`
///
/// An unknown id answers 404 before the submitted form is looked at.
async fn update_contact(
    State(state): State<AppState>,
    transport: Transport,
    Path(id): Path<String>,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;

    let store = state.stores.open();
    let service = ContactService::new(store.as_ref());
    let existing = service.fetch_for_edit(id).await?.ok_or(AppError::NotFound)?;

    let view = match validate::validate_contact(&form) {
        Ok(fields) => {
            let updated = service
                .update_contact(id, &fields)
                .await?
                .ok_or(AppError::NotFound)?;
            tracing::info!(id, "contact updated");
            View::contact(&updated, ListAction::Replace)
        }
        Err(errors) => View::form(&form, &errors, Some(&existing)),
    };
    drop(store);

    state.delay.pause().await;
    Ok(view.into_response(transport.shape()))
}

/// `DELETE /contacts/{id}/`
async fn delete_contact(
    State(state): State<AppState>,
    transport: Transport,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;

    let store = state.stores.open();
    let deleted = ContactService::new(store.as_ref())
        .delete_contact(id)
        .await?
        .ok_or(AppError::NotFound)?;
    drop(store);
    tracing::info!(id, "contact deleted");

    state.delay.pause().await;
    Ok(View::deleted(&deleted).into_response(transport.shape()))
}

/// `GET /contacts/add/`
async fn add_form(transport: Transport) -> Response {
    View::form(&ContactForm::default(), &FieldErrors::new(), None).into_response(transport.shape())
}

/// `GET /contacts/{id}/change/`
async fn change_form(
    State(state): State<AppState>,
    transport: Transport,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;

    let store = state.stores.open();
    let contact = ContactService::new(store.as_ref())
        .fetch_for_edit(id)
        .await?
        .ok_or(AppError::NotFound)?;
    drop(store);

    let form = ContactForm::from_contact(&contact);
    Ok(View::form(&form, &FieldErrors::new(), Some(&contact)).into_response(transport.shape()))
}

/// `POST /validate/email-address/`
async fn validate_email(Form(form): Form<EmailForm>) -> Response {
    match validate::validate_email(&form) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(errors) => (
            StatusCode::BAD_REQUEST,
            Extension(Rendered),
            Html(render::form_errors(errors.get("email_address"))),
        )
            .into_response(),
    }
}
